//! The per-notebook pipeline: load, format every code cell, reassemble, then
//! write back or compare.

use crate::cli_types::WriteBack;
use crate::code_formatter::{CodeFormatter, FormatError};
use crate::config::RunConfiguration;
use crate::magics::{self, Extraction, MagicPredicate};
use crate::notebook::{NotebookDocument, NotebookError};
use crate::output::diff;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Result of formatting one code cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    Unchanged,
    Reformatted(String),
    /// The cell keeps its original source
    Invalid(String),
}

/// Why a notebook could not be processed at all.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Notebook(#[from] NotebookError),

    #[error("cell {index}: {source}, notebook left unchanged")]
    Aborted { index: usize, source: FormatError },
}

/// A code cell that could not be formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidCell {
    pub reason: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Ok,
    /// Reformatted in format mode, would be reformatted in check mode
    Changed,
    Failed(String),
}

/// Everything the reporter needs to know about one notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub path: PathBuf,
    pub mode: WriteBack,
    pub status: FileStatus,
    pub invalid_cells: BTreeMap<usize, InvalidCell>,
    /// Line diff of the notebook text, check mode with `--diff` only
    pub diff: Option<String>,
}

impl FileResult {
    fn failed(path: &Path, mode: WriteBack, reason: String) -> Self {
        Self {
            path: path.to_path_buf(),
            mode,
            status: FileStatus::Failed(reason),
            invalid_cells: BTreeMap::new(),
            diff: None,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.status == FileStatus::Changed
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, FileStatus::Failed(_))
    }
}

/// Shared, read-only inputs of every file task.
#[derive(Clone, Copy)]
pub struct TaskContext<'a> {
    pub config: &'a RunConfiguration,
    pub formatter: &'a dyn CodeFormatter,
    pub magics: &'a dyn MagicPredicate,
}

/// The formatted notebook text and the cells that could not be formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookOutcome {
    pub formatted: String,
    pub changed: bool,
    pub invalid_cells: BTreeMap<usize, InvalidCell>,
}

/// Format a single cell's source.
///
/// Formatter problems make the cell [`FormatOutcome::Invalid`]; only an error
/// that must abort the whole notebook is returned as `Err`.
pub fn format_cell(source: &str, ctx: &TaskContext<'_>) -> Result<FormatOutcome, FormatError> {
    let masked = match magics::extract(source, ctx.magics) {
        Extraction::Skip => return Ok(FormatOutcome::Unchanged),
        Extraction::Code(masked) => masked,
    };

    let formatted = match ctx.formatter.format(masked.code(), &ctx.config.style) {
        Ok(formatted) => formatted,
        Err(e) if e.aborts_notebook() => return Err(e),
        Err(e) => return Ok(FormatOutcome::Invalid(e.to_string())),
    };

    Ok(match masked.restore(&formatted) {
        Ok(restored) if restored == source => FormatOutcome::Unchanged,
        Ok(restored) => FormatOutcome::Reformatted(restored),
        Err(e) => FormatOutcome::Invalid(e.to_string()),
    })
}

fn is_python(language: &str) -> bool {
    matches!(
        language.to_ascii_lowercase().as_str(),
        "python" | "python3" | "ipython" | "ipython3"
    )
}

/// Format every code cell of the notebook in `text`.
pub fn process_notebook(text: &str, ctx: &TaskContext<'_>) -> Result<NotebookOutcome, TaskError> {
    let mut document = NotebookDocument::parse(text)?;

    if let Some(language) = document.language()
        && !is_python(language)
    {
        log::debug!("Skipping notebook with kernel language '{language}'");
        return Ok(NotebookOutcome {
            formatted: text.to_string(),
            changed: false,
            invalid_cells: BTreeMap::new(),
        });
    }

    let sources: Vec<(usize, String)> = document
        .code_cells()
        .map(|cell| (cell.index(), cell.source()))
        .collect();

    let mut invalid_cells = BTreeMap::new();
    for (index, source) in sources {
        let outcome = format_cell(&source, ctx).map_err(|err| TaskError::Aborted { index, source: err })?;
        match outcome {
            FormatOutcome::Unchanged => {}
            FormatOutcome::Reformatted(new_source) => document.set_cell_source(index, &new_source)?,
            FormatOutcome::Invalid(reason) => {
                log::debug!("Cell {index} left as is: {reason}");
                invalid_cells.insert(index, InvalidCell { reason, source });
            }
        }
    }

    let formatted = document.serialize()?;
    Ok(NotebookOutcome {
        changed: formatted != text,
        formatted,
        invalid_cells,
    })
}

/// Run the full pipeline for one notebook file.
///
/// Never panics or returns early on a notebook problem; failures end up in
/// the returned [`FileResult`].
pub fn process_file(path: &Path, ctx: &TaskContext<'_>) -> FileResult {
    let start = Instant::now();
    let mode = ctx.config.write_back;

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(source) => {
            let err = NotebookError::Io {
                path: path.to_path_buf(),
                source,
            };
            return FileResult::failed(path, mode, err.to_string());
        }
    };

    let outcome = match process_notebook(&text, ctx) {
        Ok(outcome) => outcome,
        Err(e) => return FileResult::failed(path, mode, e.to_string()),
    };

    let mut result = FileResult {
        path: path.to_path_buf(),
        mode,
        status: if outcome.changed { FileStatus::Changed } else { FileStatus::Ok },
        invalid_cells: outcome.invalid_cells,
        diff: None,
    };

    if outcome.changed {
        match mode {
            WriteBack::Format => {
                if let Err(e) = write_atomically(path, &outcome.formatted) {
                    result.status = FileStatus::Failed(format!("failed to write: {e}"));
                }
            }
            WriteBack::Check => {
                if ctx.config.show_diff {
                    let display = path.display().to_string();
                    result.diff = Some(diff::generate_diff(&text, &outcome.formatted, &display));
                }
            }
        }
    }

    log::debug!("{} processed in {:?}", path.display(), start.elapsed());
    result
}

/// Replace `path` with `content` so readers see either the old or the new file.
fn write_atomically(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = std::fs::metadata(path)?.permissions();

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.as_file().set_permissions(permissions)?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
