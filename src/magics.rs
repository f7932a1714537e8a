//! Masking of IPython magics in code cells.
//!
//! Lines such as `%matplotlib inline`, `!pip install x` or `df.head?` are not
//! Python and make any formatter reject the whole cell. Before formatting each
//! directive is replaced by a placeholder expression statement that is unique
//! within the cell; after formatting the placeholder is swapped back for the
//! original directive.

use regex::Regex;
use std::sync::LazyLock;

/// `files = !ls` and `t = %timeit -o f()`
static ASSIGNED_MAGIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][\w.]*(\s*,\s*[A-Za-z_][\w.]*)*\s*=\s*[!%]").unwrap()
});

/// `obj?`, `obj.method??`
static HELP_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][\w.\[\]'\x22]*\?{1,2}$").unwrap());

/// Decides which lines of a code cell are directives the formatter must not see.
pub trait MagicPredicate: Send + Sync {
    fn is_magic(&self, line: &str) -> bool;
}

/// IPython's line magics, shell escapes and help syntax, plus user patterns.
#[derive(Debug, Clone, Default)]
pub struct MagicMatcher {
    extra_patterns: Vec<Regex>,
}

impl MagicMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the built-in rules with additional regular expressions.
    pub fn with_patterns<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra_patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { extra_patterns })
    }

    fn is_builtin_magic(line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return false;
        }
        trimmed.starts_with(['%', '!', '?']) || HELP_SUFFIX.is_match(trimmed) || ASSIGNED_MAGIC.is_match(trimmed)
    }
}

impl MagicPredicate for MagicMatcher {
    fn is_magic(&self, line: &str) -> bool {
        Self::is_builtin_magic(line) || self.extra_patterns.iter().any(|re| re.is_match(line))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaskError {
    #[error("reassembly ambiguous: placeholder {token} found {count} times after formatting")]
    Ambiguous { token: String, count: usize },

    #[error("reassembly ambiguous: placeholder {token} was rewritten by the formatter")]
    Altered { token: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Directive {
    token: String,
    /// Original lines without line terminators; more than one for `\` continuations
    lines: Vec<String>,
}

/// Cell source with every directive replaced by a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedCell {
    code: String,
    directives: Vec<Directive>,
    trailing_newline: bool,
    /// `\r\n` when the cell's first line ends that way
    line_ending: &'static str,
}

/// Result of preparing a cell for the formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Nothing to format: blank cell, directives only, or a `%%` cell magic
    Skip,
    Code(MaskedCell),
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn line_ending(source: &str) -> &'static str {
    match source.find('\n') {
        Some(end) if source[..end].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

/// Pick a placeholder prefix that does not occur anywhere in `source`.
fn placeholder_prefix(source: &str) -> String {
    let mut nonce = 0u32;
    loop {
        let prefix = format!("__nbfmt_magic_{nonce}_");
        if !source.contains(&prefix) {
            return prefix;
        }
        nonce += 1;
    }
}

/// Mask the directives of a cell's source.
pub fn extract(source: &str, predicate: &dyn MagicPredicate) -> Extraction {
    let lines: Vec<&str> = source.lines().collect();

    let first_content = lines.iter().find(|line| !line.trim().is_empty());
    match first_content {
        None => return Extraction::Skip,
        Some(line) if line.trim_start().starts_with("%%") => return Extraction::Skip,
        Some(_) => {}
    }

    let prefix = placeholder_prefix(source);
    let mut code_lines = Vec::with_capacity(lines.len());
    let mut directives: Vec<Directive> = Vec::new();
    let mut has_code = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if predicate.is_magic(line) {
            let mut directive_lines = vec![line.to_string()];
            while lines[i].trim_end().ends_with('\\') && i + 1 < lines.len() {
                i += 1;
                directive_lines.push(lines[i].to_string());
            }
            let token = format!("{prefix}{}__", directives.len());
            code_lines.push(format!("{}{token}", leading_whitespace(line)));
            directives.push(Directive {
                token,
                lines: directive_lines,
            });
        } else {
            has_code |= !line.trim().is_empty();
            code_lines.push(line.to_string());
        }
        i += 1;
    }

    if !has_code {
        return Extraction::Skip;
    }

    let mut code = code_lines.join("\n");
    code.push('\n');

    Extraction::Code(MaskedCell {
        code,
        directives,
        trailing_newline: source.ends_with('\n'),
        line_ending: line_ending(source),
    })
}

impl MaskedCell {
    /// The text handed to the formatter.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn directive_count(&self) -> usize {
        self.directives.len()
    }

    /// Put the original directives back into formatted code.
    ///
    /// Each placeholder must appear on exactly one line of its own. The
    /// restored directive takes the indentation the formatter gave the
    /// placeholder; continuation lines are restored verbatim.
    pub fn restore(&self, formatted: &str) -> Result<String, MaskError> {
        let mut lines: Vec<String> = formatted.lines().map(str::to_string).collect();

        for directive in &self.directives {
            let positions: Vec<usize> = lines
                .iter()
                .enumerate()
                .filter(|(_, line)| line.contains(&directive.token))
                .map(|(index, _)| index)
                .collect();

            let &[position] = positions.as_slice() else {
                return Err(MaskError::Ambiguous {
                    token: directive.token.clone(),
                    count: positions.len(),
                });
            };

            let placeholder = &lines[position];
            if placeholder.trim() != directive.token {
                return Err(MaskError::Altered {
                    token: directive.token.clone(),
                });
            }

            let mut restored = leading_whitespace(placeholder).to_string();
            for (n, original) in directive.lines.iter().enumerate() {
                if n == 0 {
                    restored.push_str(original.trim_start());
                } else {
                    restored.push_str(self.line_ending);
                    restored.push_str(original);
                }
            }
            lines[position] = restored;
        }

        let mut text = lines.join(self.line_ending);
        if self.trailing_newline {
            text.push_str(self.line_ending);
        }
        Ok(text)
    }
}
