//! Byte spans of cell `source` values inside the raw notebook text.
//!
//! Re-serializing a whole notebook through `serde_json` would normalize
//! whitespace, escapes and number formatting. Instead the raw text is kept and
//! only the `source` values of edited cells are replaced in place.

use serde::Deserialize;
use serde_json::value::RawValue;
use std::ops::Range;

#[derive(Deserialize)]
struct RawNotebook<'a> {
    #[serde(borrow)]
    cells: Vec<RawCell<'a>>,
}

#[derive(Deserialize)]
struct RawCell<'a> {
    #[serde(borrow, default)]
    source: Option<&'a RawValue>,
}

/// Locate the byte range of every cell's `source` value.
///
/// Returns one entry per cell, `None` when the cell has no `source` key.
pub(crate) fn locate_sources(text: &str) -> Result<Vec<Option<Range<usize>>>, String> {
    let notebook: RawNotebook<'_> = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let base = text.as_ptr() as usize;

    notebook
        .cells
        .iter()
        .enumerate()
        .map(|(index, cell)| {
            let Some(raw) = cell.source else {
                return Ok(None);
            };
            let slice = raw.get();
            let start = (slice.as_ptr() as usize).wrapping_sub(base);
            let range = start..start + slice.len();
            // RawValue borrows from the input, so the slice must sit inside it
            if text.get(range.clone()) == Some(slice) {
                Ok(Some(range))
            } else {
                Err(format!("could not locate the source of cell {index}"))
            }
        })
        .collect()
}

/// Leading whitespace of the line containing byte `offset`.
pub(crate) fn line_indent(text: &str, offset: usize) -> &str {
    let line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &text[line_start..offset];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

#[derive(Debug, PartialEq, Eq)]
enum ArrayLayout {
    /// `["a", "b"]` on a single line
    Inline,
    /// One item per line
    Multiline { item_indent: String, close_indent: String },
}

fn array_layout(original: &str, key_indent: &str) -> ArrayLayout {
    let inner = original
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or_default();

    if inner.trim().is_empty() {
        // nbformat writes the `source` key three levels deep
        let unit_width = (key_indent.len() / 3).max(1);
        let unit_char = if key_indent.starts_with('\t') { "\t" } else { " " };
        return ArrayLayout::Multiline {
            item_indent: format!("{key_indent}{}", unit_char.repeat(unit_width)),
            close_indent: key_indent.to_string(),
        };
    }

    let Some(first_newline) = inner.find('\n') else {
        return ArrayLayout::Inline;
    };

    let after_newline = &inner[first_newline + 1..];
    let item_indent: String = after_newline.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
    let close_indent = inner
        .rfind('\n')
        .map(|i| &inner[i + 1..])
        .filter(|tail| tail.chars().all(|c| c == ' ' || c == '\t'))
        .unwrap_or(key_indent)
        .to_string();

    ArrayLayout::Multiline {
        item_indent,
        close_indent,
    }
}

/// Encode `lines` so it can replace `original` (the old raw `source` value).
///
/// The JSON shape of the original is kept: a string stays a string, an array
/// keeps its inline or one-item-per-line layout and indentation.
pub(crate) fn encode_source(
    original: &str,
    key_indent: &str,
    newline: &str,
    lines: &[String],
) -> Result<String, serde_json::Error> {
    if original.starts_with('"') {
        return serde_json::to_string(&lines.concat());
    }

    if lines.is_empty() {
        return Ok("[]".to_string());
    }

    let items = lines
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;

    let encoded = match array_layout(original, key_indent) {
        ArrayLayout::Inline => format!("[{}]", items.join(", ")),
        ArrayLayout::Multiline {
            item_indent,
            close_indent,
        } => {
            let separator = format!(",{newline}{item_indent}");
            format!(
                "[{newline}{item_indent}{}{newline}{close_indent}]",
                items.join(&separator)
            )
        }
    };
    Ok(encoded)
}
