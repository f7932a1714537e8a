use crate::code_formatter::{FormatterBackend, TargetVersion};
use clap::Args;
use std::path::PathBuf;

/// Write-back mode: whether a run rewrites notebooks or only reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteBack {
    /// Rewrite notebooks in place
    #[default]
    Format,
    /// Report notebooks that would change, never write
    Check,
}

impl WriteBack {
    /// `--diff` never writes, so it implies check mode.
    pub fn from_flags(check: bool, diff: bool) -> Self {
        if check || diff { Self::Check } else { Self::Format }
    }
}

fn parse_workers(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(count) => Ok(count),
        Err(e) => Err(e.to_string()),
    }
}

#[derive(Args, Debug, Default)]
pub struct FormatArgs {
    /// Notebooks or directories to format (directories are searched for *.ipynb)
    #[arg(required = true)]
    pub targets: Vec<PathBuf>,

    /// Don't write the files back, just return the status
    #[arg(long)]
    pub check: bool,

    /// Don't write the files back, print a diff for each notebook that would change
    #[arg(long)]
    pub diff: bool,

    /// How many characters per line to allow [default: 88]
    #[arg(short = 'l', long)]
    pub line_length: Option<usize>,

    /// Don't normalize string quotes or prefixes
    #[arg(short = 'S', long)]
    pub skip_string_normalization: bool,

    /// Format code cells as typing stubs
    #[arg(long)]
    pub pyi: bool,

    /// Python versions that should be supported by the output (repeatable)
    #[arg(short = 't', long = "target-version", value_enum, ignore_case = true)]
    pub target_version: Vec<TargetVersion>,

    /// Number of parallel workers; 1 processes notebooks sequentially [default: number of CPUs]
    #[arg(short = 'w', long, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Report the code cells that could not be formatted
    #[arg(long)]
    pub show_invalid_code: bool,

    /// Formatter used for code cells [default: black]
    #[arg(long, value_enum)]
    pub formatter: Option<FormatterBackend>,

    /// Exclude files or directories (comma-separated glob patterns)
    #[arg(long)]
    pub exclude: Option<String>,

    /// Don't respect .gitignore files when searching directories
    #[arg(long)]
    pub no_respect_gitignore: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Ignore all configuration files
    #[arg(long, conflicts_with = "config")]
    pub no_config: bool,

    /// Show debug output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show errors
    #[arg(short, long)]
    pub quiet: bool,
}
