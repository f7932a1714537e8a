//! Final report for a run and the exit code that goes with it.

use crate::cli_types::WriteBack;
use crate::config::RunConfiguration;
use crate::exit_codes;
use crate::file_processor::{FileResult, FileStatus, InvalidCell};
use crate::parallel::RunOutcome;
use colored::*;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};

pub mod diff;

pub const INVALID_CODE_HEADER: &str = "WARN: Detected the following invalid code snippets:";

fn files(count: usize) -> String {
    if count == 1 {
        "1 file".to_string()
    } else {
        format!("{count} files")
    }
}

/// Invalid cells keyed by notebook path, in report order.
pub fn invalid_code_detail(results: &[FileResult]) -> IndexMap<String, &BTreeMap<usize, InvalidCell>> {
    results
        .iter()
        .filter(|result| !result.invalid_cells.is_empty())
        .map(|result| (result.path.display().to_string(), &result.invalid_cells))
        .collect()
}

/// Serialize with four-space indentation.
fn to_pretty_json<T: Serialize>(value: &T) -> io::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer).map_err(io::Error::other)?;
    String::from_utf8(buf).map_err(io::Error::other)
}

/// Print the outcome of a run and return the process exit code.
///
/// Summary and details go to `out`; per-file errors and the interrupt
/// notice go to `err`.
pub fn report(outcome: &RunOutcome, config: &RunConfiguration, out: &mut dyn Write, err: &mut dyn Write) -> io::Result<i32> {
    let results = &outcome.results;

    for result in results {
        if let FileStatus::Failed(reason) = &result.status {
            writeln!(err, "{}: cannot format {}: {reason}", "error".red().bold(), result.path.display())?;
        }
    }

    for diff in results.iter().filter_map(|result| result.diff.as_deref()) {
        write!(out, "{diff}")?;
    }

    let detail = invalid_code_detail(results);
    if config.show_invalid_code && !detail.is_empty() {
        writeln!(out, "{}", INVALID_CODE_HEADER.yellow())?;
        writeln!(out, "{}", to_pretty_json(&detail)?)?;
    }

    let failed = results.iter().filter(|result| result.is_failed()).count();
    let changed: Vec<&FileResult> = results.iter().filter(|result| result.is_changed()).collect();

    match config.write_back {
        WriteBack::Format => {
            let unchanged = results.len() - changed.len() - failed;
            writeln!(out, "{}", "All done!".bold())?;
            let mut summary = format!(
                "{} reformatted, {} left unchanged",
                files(changed.len()),
                files(unchanged)
            );
            if failed > 0 {
                summary.push_str(&format!(", {} failed to reformat", files(failed)));
            }
            writeln!(out, "{summary}")?;
        }
        WriteBack::Check => {
            if changed.is_empty() {
                if failed == 0 {
                    writeln!(out, "{}", "All good! Supplied targets are already formatted.".green())?;
                }
            } else {
                writeln!(out, "{}", "Files that need formatting:".bold())?;
                for result in &changed {
                    writeln!(out, "  - {}", result.path.display())?;
                }
            }
        }
    }

    if outcome.interrupted {
        writeln!(
            err,
            "{}: interrupted, {} of {} processed",
            "warning".yellow().bold(),
            files(results.len()),
            results.len() + outcome.skipped.len()
        )?;
        return Ok(exit_codes::INTERRUPTED);
    }

    let code = if failed > 0 {
        exit_codes::TOOL_ERROR
    } else if config.write_back == WriteBack::Check && !changed.is_empty() {
        exit_codes::WOULD_REFORMAT
    } else {
        exit_codes::SUCCESS
    };
    Ok(code)
}
