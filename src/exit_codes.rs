/// Exit codes for nbfmt, following Black's convention
///
/// These exit codes allow users and CI/CD systems to distinguish between
/// different types of failures.
/// Success - Every notebook is formatted (or was reformatted)
pub const SUCCESS: i32 = 0;

/// Check mode found notebooks that would be reformatted
pub const WOULD_REFORMAT: i32 = 1;

/// Tool error - Bad targets, configuration error, missing formatter, or notebooks that failed
pub const TOOL_ERROR: i32 = 2;

/// The run was stopped by an interrupt signal (128 + SIGINT)
pub const INTERRUPTED: i32 = 130;
