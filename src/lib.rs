//! Format the Python code cells of Jupyter notebooks with an external
//! formatter, leaving everything else in the file byte-for-byte intact.

pub mod cli_types;
pub mod code_formatter;
pub mod config;
pub mod exit_codes;
pub mod file_processor;
pub mod interrupt;
pub mod magics;
pub mod notebook;
pub mod output;
pub mod parallel;

pub use crate::code_formatter::{CodeFormatter, FormatError, StyleOptions};
pub use crate::file_processor::{FileResult, FileStatus, TaskContext, TaskError, process_file, process_notebook};
pub use crate::notebook::{NotebookDocument, NotebookError};
