//! Command lines for the supported formatters.

use super::executor::{ToolExecutor, ToolOutput};
use super::{CodeFormatter, FormatError, StyleOptions};
use serde::{Deserialize, Serialize};

/// black's exit code for input it cannot parse.
const BLACK_PARSE_ERROR_EXIT: i32 = 123;

/// Formatters with built-in support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatterBackend {
    #[default]
    Black,
    Ruff,
}

impl FormatterBackend {
    pub fn program(self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Ruff => "ruff",
        }
    }

    /// Build the full command line that formats stdin to stdout.
    pub fn command_line(self, options: &StyleOptions) -> Vec<String> {
        let mut cmd = vec![self.program().to_string()];
        match self {
            Self::Black => {
                cmd.push("--quiet".to_string());
                cmd.push("--line-length".to_string());
                cmd.push(options.line_length.to_string());
                if !options.string_normalization {
                    cmd.push("--skip-string-normalization".to_string());
                }
                if options.is_pyi {
                    cmd.push("--pyi".to_string());
                }
                for version in &options.target_versions {
                    cmd.push("--target-version".to_string());
                    cmd.push(version.to_string());
                }
            }
            Self::Ruff => {
                cmd.push("format".to_string());
                cmd.push("--line-length".to_string());
                cmd.push(options.line_length.to_string());
                let stdin_filename = if options.is_pyi { "_.pyi" } else { "_.py" };
                cmd.push(format!("--stdin-filename={stdin_filename}"));
                // ruff accepts a single, minimum version
                if let Some(version) = options.target_versions.first() {
                    cmd.push("--target-version".to_string());
                    cmd.push(version.to_string());
                }
                if !options.string_normalization {
                    cmd.push("--config".to_string());
                    cmd.push("format.quote-style = 'preserve'".to_string());
                }
            }
        }
        cmd.push("-".to_string());
        cmd
    }
}

/// Which command to run for each cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatterCommand {
    Builtin(FormatterBackend),
    /// Run verbatim; style options are not forwarded
    Custom(Vec<String>),
}

impl Default for FormatterCommand {
    fn default() -> Self {
        Self::Builtin(FormatterBackend::default())
    }
}

/// A [`CodeFormatter`] backed by an external process.
#[derive(Debug, Clone)]
pub struct ExternalFormatter {
    command: FormatterCommand,
    executor: ToolExecutor,
    timeout_ms: u64,
}

impl ExternalFormatter {
    pub fn new(command: FormatterCommand, timeout_ms: u64) -> Self {
        Self {
            command,
            executor: ToolExecutor::new(timeout_ms),
            timeout_ms,
        }
    }

    /// The binary this formatter runs.
    pub fn program(&self) -> Option<&str> {
        match &self.command {
            FormatterCommand::Builtin(backend) => Some(backend.program()),
            FormatterCommand::Custom(command) => command.first().map(String::as_str),
        }
    }

    pub fn command_line(&self, options: &StyleOptions) -> Vec<String> {
        match &self.command {
            FormatterCommand::Builtin(backend) => backend.command_line(options),
            FormatterCommand::Custom(command) => command.clone(),
        }
    }

    /// Fail early when the formatter binary cannot be started.
    pub fn check_available(&self) -> Result<(), FormatError> {
        match self.program() {
            None => Err(FormatError::Unavailable("empty formatter command".to_string())),
            Some(program) if !self.executor.is_tool_available(program) => {
                Err(FormatError::Unavailable(format!("'{program}' not found in PATH")))
            }
            Some(_) => Ok(()),
        }
    }
}

impl CodeFormatter for ExternalFormatter {
    fn format(&self, code: &str, options: &StyleOptions) -> Result<String, FormatError> {
        let command = self.command_line(options);
        let output = self.executor.execute(&command, code, Some(self.timeout_ms))?;

        if output.success {
            return Ok(output.stdout);
        }
        if let Some(signal) = output.signal {
            return Err(FormatError::Terminated(format!("killed by signal {signal}")));
        }

        let summary = failure_summary(&output);
        if is_parse_failure(&output) {
            Err(FormatError::Syntax(summary))
        } else {
            Err(FormatError::Failed(summary))
        }
    }
}

/// black exits with 123, ruff reports `Failed to parse`.
fn is_parse_failure(output: &ToolOutput) -> bool {
    if output.exit_code == BLACK_PARSE_ERROR_EXIT {
        return true;
    }
    let stderr = output.stderr.to_ascii_lowercase();
    stderr.contains("cannot parse") || stderr.contains("failed to parse")
}

/// First meaningful line of a failed formatter run.
///
/// black: `error: cannot format -: Cannot parse: 1:4: x = = 1`
/// ruff:  `error: Failed to parse _.py:1:5: Expected an expression`
fn failure_summary(output: &ToolOutput) -> String {
    let line = output
        .stderr
        .lines()
        .chain(output.stdout.lines())
        .map(str::trim)
        .find(|line| !line.is_empty());

    match line {
        Some(line) => {
            let line = line.strip_prefix("error: ").unwrap_or(line);
            line.strip_prefix("cannot format -: ").unwrap_or(line).to_string()
        }
        None => format!("formatter exited with code {}", output.exit_code),
    }
}
