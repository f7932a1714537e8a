//! In-memory model of a Jupyter notebook.
//!
//! A [`NotebookDocument`] keeps the original file text next to the parsed
//! cells. Only the `source` values of edited code cells are rewritten on
//! [`NotebookDocument::serialize`]; every other byte of the file (outputs,
//! metadata written by third-party tools, key order, indentation) survives
//! untouched.

mod spans;

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Errors raised while loading or serializing a notebook.
#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid notebook structure: {0}")]
    Structure(String),
}

/// The `cell_type` of a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellKind {
    Code,
    Markdown,
    Raw,
    Other(String),
}

impl CellKind {
    fn from_cell_type(cell_type: &str) -> Self {
        match cell_type {
            "code" => Self::Code,
            "markdown" => Self::Markdown,
            "raw" => Self::Raw,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Code => "code",
            Self::Markdown => "markdown",
            Self::Raw => "raw",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cell of a notebook.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    index: usize,
    kind: CellKind,
    lines: Vec<String>,
    metadata: Map<String, Value>,
}

impl Cell {
    fn from_value(index: usize, value: Value) -> Result<Self, NotebookError> {
        let Value::Object(mut fields) = value else {
            return Err(NotebookError::Structure(format!("cell {index} is not an object")));
        };

        let kind = match fields.get("cell_type").and_then(Value::as_str) {
            Some(cell_type) => CellKind::from_cell_type(cell_type),
            None => {
                return Err(NotebookError::Structure(format!("cell {index} has no `cell_type`")));
            }
        };

        let lines = match fields.remove("source") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(text)) => split_source_lines(&text),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(line) => Ok(line),
                    _ => Err(NotebookError::Structure(format!(
                        "cell {index} has a non-string source line"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(NotebookError::Structure(format!(
                    "cell {index} has a source that is neither a string nor a list"
                )));
            }
        };

        let metadata = match fields.remove("metadata") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        Ok(Self {
            index,
            kind,
            lines,
            metadata,
        })
    }

    /// Position of the cell in the notebook.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> &CellKind {
        &self.kind
    }

    pub fn is_code(&self) -> bool {
        self.kind == CellKind::Code
    }

    /// Source lines as stored in the notebook, each keeping its `\n`.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The full source text of the cell.
    pub fn source(&self) -> String {
        self.lines.concat()
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }
}

/// Split cell text into nbformat source lines: every line keeps its trailing
/// newline, only the last one may lack it.
pub fn split_source_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

/// A parsed notebook together with its original text.
#[derive(Debug, Clone)]
pub struct NotebookDocument {
    text: String,
    cells: Vec<Cell>,
    spans: Vec<Option<Range<usize>>>,
    metadata: Map<String, Value>,
    edited: BTreeSet<usize>,
}

impl NotebookDocument {
    /// Read and parse the notebook at `path`.
    pub fn load(path: &Path) -> Result<Self, NotebookError> {
        let text = std::fs::read_to_string(path).map_err(|source| NotebookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(text)
    }

    /// Parse notebook text.
    pub fn parse(text: impl Into<String>) -> Result<Self, NotebookError> {
        let text = text.into();
        let Value::Object(mut root) = serde_json::from_str::<Value>(&text)? else {
            return Err(NotebookError::Structure("top-level value is not an object".to_string()));
        };

        let cells = match root.remove("cells") {
            Some(Value::Array(cells)) => cells,
            Some(_) => return Err(NotebookError::Structure("`cells` is not a list".to_string())),
            None => return Err(NotebookError::Structure("missing `cells` list".to_string())),
        };
        let metadata = match root.remove("metadata") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let cells = cells
            .into_iter()
            .enumerate()
            .map(|(index, value)| Cell::from_value(index, value))
            .collect::<Result<Vec<_>, _>>()?;

        let spans = spans::locate_sources(&text).map_err(NotebookError::Structure)?;
        if spans.len() != cells.len() {
            return Err(NotebookError::Structure(format!(
                "found {} cells but {} source spans",
                cells.len(),
                spans.len()
            )));
        }

        Ok(Self {
            text,
            cells,
            spans,
            metadata,
            edited: BTreeSet::new(),
        })
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn code_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|cell| cell.is_code())
    }

    /// Notebook-level metadata.
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// The kernel language declared by the notebook, if any.
    pub fn language(&self) -> Option<&str> {
        self.metadata
            .get("language_info")
            .and_then(|info| info.get("name"))
            .and_then(Value::as_str)
            .or_else(|| {
                self.metadata
                    .get("kernelspec")
                    .and_then(|spec| spec.get("language"))
                    .and_then(Value::as_str)
            })
    }

    /// The text the document was parsed from.
    pub fn original_text(&self) -> &str {
        &self.text
    }

    pub fn is_modified(&self) -> bool {
        !self.edited.is_empty()
    }

    /// Replace the source of a code cell.
    ///
    /// Setting identical text is a no-op and does not mark the document modified.
    pub fn set_cell_source(&mut self, index: usize, text: &str) -> Result<(), NotebookError> {
        let Some(cell) = self.cells.get_mut(index) else {
            return Err(NotebookError::Structure(format!("no cell at index {index}")));
        };
        if !cell.is_code() {
            return Err(NotebookError::Structure(format!(
                "cell {index} is a {} cell, only code cells can be rewritten",
                cell.kind
            )));
        }
        if self.spans[index].is_none() {
            return Err(NotebookError::Structure(format!("cell {index} has no `source` to rewrite")));
        }
        if cell.source() == text {
            return Ok(());
        }

        cell.lines = split_source_lines(text);
        self.edited.insert(index);
        Ok(())
    }

    /// Serialize the document.
    ///
    /// Without edits this returns the original text unchanged.
    pub fn serialize(&self) -> Result<String, NotebookError> {
        if self.edited.is_empty() {
            return Ok(self.text.clone());
        }

        let newline = if self.text.contains("\r\n") { "\r\n" } else { "\n" };
        let mut output = String::with_capacity(self.text.len());
        let mut cursor = 0;

        for &index in &self.edited {
            let Some(range) = self.spans[index].clone() else {
                continue;
            };
            let original = &self.text[range.clone()];
            let key_indent = spans::line_indent(&self.text, range.start);
            let encoded = spans::encode_source(original, key_indent, newline, &self.cells[index].lines)?;

            output.push_str(&self.text[cursor..range.start]);
            output.push_str(&encoded);
            cursor = range.end;
        }
        output.push_str(&self.text[cursor..]);

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NOTEBOOK: &str = r##"{
 "cells": [
  {
   "cell_type": "markdown",
   "metadata": {},
   "source": [
    "# Title\n",
    "Some *text*"
   ]
  },
  {
   "cell_type": "code",
   "execution_count": 1,
   "metadata": {"tags": ["parameters"], "thirdparty": {"keep": true}},
   "outputs": [],
   "source": [
    "x=1\n",
    "y  =  2"
   ]
  },
  {
   "cell_type": "raw",
   "metadata": {},
   "source": "raw \u00e9\ttext"
  }
 ],
 "metadata": {
  "kernelspec": {"language": "python", "name": "python3"},
  "unknown_tool": {"a": 1.50}
 },
 "nbformat": 4,
 "nbformat_minor": 5
}
"##;

    #[test]
    fn test_parse_cells() {
        let doc = NotebookDocument::parse(NOTEBOOK).unwrap();
        let cells = doc.cells();

        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].kind(), &CellKind::Markdown);
        assert_eq!(cells[1].kind(), &CellKind::Code);
        assert_eq!(cells[2].kind(), &CellKind::Raw);
        assert_eq!(cells[1].source(), "x=1\ny  =  2");
        assert_eq!(cells[2].source(), "raw é\ttext");
        assert_eq!(cells[1].index(), 1);
        assert!(cells[1].metadata().contains_key("thirdparty"));
        assert_eq!(doc.code_cells().count(), 1);
        assert_eq!(doc.language(), Some("python"));
    }

    #[test]
    fn test_untouched_document_round_trips_exactly() {
        let doc = NotebookDocument::parse(NOTEBOOK).unwrap();
        assert!(!doc.is_modified());
        assert_eq!(doc.serialize().unwrap(), NOTEBOOK);
    }

    #[test]
    fn test_edit_replaces_only_the_source_value() {
        let mut doc = NotebookDocument::parse(NOTEBOOK).unwrap();
        doc.set_cell_source(1, "x = 1\ny = 2").unwrap();

        let expected = NOTEBOOK.replace(
            "\"x=1\\n\",\n    \"y  =  2\"",
            "\"x = 1\\n\",\n    \"y = 2\"",
        );
        assert_eq!(doc.serialize().unwrap(), expected);

        let reparsed = NotebookDocument::parse(doc.serialize().unwrap()).unwrap();
        assert_eq!(reparsed.cells()[1].source(), "x = 1\ny = 2");
        assert_eq!(reparsed.cells()[0], doc.cells()[0]);
        assert_eq!(reparsed.cells()[2], doc.cells()[2]);
        // Escapes in untouched cells are preserved byte for byte
        assert!(doc.serialize().unwrap().contains(r#""raw \u00e9\ttext""#));
    }

    #[test]
    fn test_identical_edit_is_not_a_modification() {
        let mut doc = NotebookDocument::parse(NOTEBOOK).unwrap();
        doc.set_cell_source(1, "x=1\ny  =  2").unwrap();
        assert!(!doc.is_modified());
    }

    #[test]
    fn test_non_code_cells_cannot_be_edited() {
        let mut doc = NotebookDocument::parse(NOTEBOOK).unwrap();
        assert!(matches!(
            doc.set_cell_source(0, "# Changed"),
            Err(NotebookError::Structure(_))
        ));
        assert!(doc.set_cell_source(9, "x").is_err());
        assert!(!doc.is_modified());
    }

    #[test]
    fn test_string_source_is_rewritten_as_string() {
        let text = r#"{"cells": [{"cell_type": "code", "metadata": {}, "source": "a=1"}], "metadata": {}}"#;
        let mut doc = NotebookDocument::parse(text).unwrap();
        doc.set_cell_source(0, "a = 1").unwrap();
        assert_eq!(
            doc.serialize().unwrap(),
            r#"{"cells": [{"cell_type": "code", "metadata": {}, "source": "a = 1"}], "metadata": {}}"#
        );
    }

    #[test]
    fn test_split_source_lines() {
        assert_eq!(split_source_lines(""), Vec::<String>::new());
        assert_eq!(split_source_lines("a\nb"), vec!["a\n", "b"]);
        assert_eq!(split_source_lines("a\n"), vec!["a\n"]);
    }

    #[test]
    fn test_other_cell_kind() {
        let text = r#"{"cells": [{"cell_type": "heading", "source": "x"}]}"#;
        let doc = NotebookDocument::parse(text).unwrap();
        assert_eq!(doc.cells()[0].kind(), &CellKind::Other("heading".to_string()));
        assert_eq!(doc.language(), None);
    }

    #[test]
    fn test_language_info_takes_precedence() {
        let text = r#"{"cells": [], "metadata": {"language_info": {"name": "R"}, "kernelspec": {"language": "python"}}}"#;
        let doc = NotebookDocument::parse(text).unwrap();
        assert_eq!(doc.language(), Some("R"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(NotebookDocument::parse("not json"), Err(NotebookError::Json(_))));
        assert!(matches!(NotebookDocument::parse("[]"), Err(NotebookError::Structure(_))));
        assert!(matches!(
            NotebookDocument::parse(r#"{"nbformat": 4}"#),
            Err(NotebookError::Structure(_))
        ));
        assert!(matches!(
            NotebookDocument::parse(r#"{"cells": [{"source": "x"}]}"#),
            Err(NotebookError::Structure(_))
        ));
        assert!(matches!(
            NotebookDocument::parse(r#"{"cells": [{"cell_type": "code", "source": [1]}]}"#),
            Err(NotebookError::Structure(_))
        ));
    }

    #[test]
    fn test_cell_without_source() {
        let text = r#"{"cells": [{"cell_type": "code", "metadata": {}}]}"#;
        let mut doc = NotebookDocument::parse(text).unwrap();
        assert_eq!(doc.cells()[0].source(), "");
        assert!(doc.set_cell_source(0, "x = 1").is_err());
    }
}
