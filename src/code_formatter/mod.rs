//! The boundary to the code formatter.
//!
//! A [`CodeFormatter`] turns Python source into formatted Python source or
//! explains why it cannot. Implementations must not keep state between calls
//! so one instance can serve every worker thread at once.
//!
//! The production implementation, [`ExternalFormatter`], pipes the code through
//! `black` or `ruff format` (or a user-supplied command) over stdin/stdout:
//!
//! ```toml
//! formatter = "ruff"                        # or "black" (default)
//! formatter-command = ["black", "-q", "-"]  # overrides `formatter`, options are not forwarded
//! timeout = 30000                           # ms per cell
//! ```

pub mod backend;
pub mod executor;

pub use backend::{ExternalFormatter, FormatterBackend, FormatterCommand};
pub use executor::{ExecutorError, ToolExecutor, ToolOutput};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Black's default line length.
pub const DEFAULT_LINE_LENGTH: usize = 88;

/// Python versions the formatted code must stay compatible with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[value(rename_all = "lower")]
pub enum TargetVersion {
    Py33,
    Py34,
    Py35,
    Py36,
    Py37,
    Py38,
    Py39,
    Py310,
    Py311,
    Py312,
    Py313,
    Py314,
}

impl TargetVersion {
    pub const ALL: [TargetVersion; 12] = [
        Self::Py33,
        Self::Py34,
        Self::Py35,
        Self::Py36,
        Self::Py37,
        Self::Py38,
        Self::Py39,
        Self::Py310,
        Self::Py311,
        Self::Py312,
        Self::Py313,
        Self::Py314,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Py33 => "py33",
            Self::Py34 => "py34",
            Self::Py35 => "py35",
            Self::Py36 => "py36",
            Self::Py37 => "py37",
            Self::Py38 => "py38",
            Self::Py39 => "py39",
            Self::Py310 => "py310",
            Self::Py311 => "py311",
            Self::Py312 => "py312",
            Self::Py313 => "py313",
            Self::Py314 => "py314",
        }
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|version| version.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown target version '{s}'"))
    }
}

impl TryFrom<String> for TargetVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TargetVersion> for String {
    fn from(version: TargetVersion) -> Self {
        version.as_str().to_string()
    }
}

/// Style settings forwarded to the formatter for every cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOptions {
    pub line_length: usize,
    pub string_normalization: bool,
    pub target_versions: BTreeSet<TargetVersion>,
    /// Format as a typing stub (`.pyi`)
    pub is_pyi: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            line_length: DEFAULT_LINE_LENGTH,
            string_normalization: true,
            target_versions: BTreeSet::new(),
            is_pyi: false,
        }
    }
}

/// Why a piece of code could not be formatted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("cannot parse: {0}")]
    Syntax(String),

    #[error("formatter unavailable: {0}")]
    Unavailable(String),

    #[error("formatter timed out after {0}ms")]
    Timeout(u64),

    #[error("formatter failed: {0}")]
    Failed(String),

    /// The formatter process was killed before it finished
    #[error("formatter was terminated: {0}")]
    Terminated(String),
}

impl FormatError {
    /// Whether the notebook must be left exactly as it was read.
    pub fn aborts_notebook(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }
}

impl From<ExecutorError> for FormatError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::ToolNotFound { tool } => Self::Unavailable(format!("'{tool}' not found in PATH")),
            ExecutorError::Timeout { timeout_ms, .. } => Self::Timeout(timeout_ms),
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Formats one unit of Python code.
pub trait CodeFormatter: Send + Sync {
    fn format(&self, code: &str, options: &StyleOptions) -> Result<String, FormatError>;
}

impl<F> CodeFormatter for F
where
    F: Fn(&str, &StyleOptions) -> Result<String, FormatError> + Send + Sync,
{
    fn format(&self, code: &str, options: &StyleOptions) -> Result<String, FormatError> {
        self(code, options)
    }
}
