//! This module defines the configuration file schema, configuration discovery,
//! and the resolution of file settings and CLI flags into one immutable
//! [`RunConfiguration`].
//!
//! Sources, lowest precedence first: `[tool.black]` in `pyproject.toml`,
//! `[tool.nbfmt]` in `pyproject.toml`, `.nbfmt.toml` / `nbfmt.toml`, CLI flags.

use crate::cli_types::{FormatArgs, WriteBack};
use crate::code_formatter::{DEFAULT_LINE_LENGTH, FormatterBackend, FormatterCommand, StyleOptions, TargetVersion};
use serde::Deserialize;
use std::io;
use std::path::Path;

/// Default per-cell formatter timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

const NBFMT_CONFIG_FILES: &[&str] = &[".nbfmt.toml", "nbfmt.toml"];

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file at {path}: {source}")]
    IoError { source: io::Error, path: String },

    /// Failed to parse the configuration content
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Settings read from an nbfmt config file or the `[tool.nbfmt]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub line_length: Option<usize>,
    pub skip_string_normalization: Option<bool>,
    pub target_version: Option<Vec<TargetVersion>>,
    pub pyi: Option<bool>,
    pub workers: Option<usize>,
    pub formatter: Option<FormatterBackend>,
    pub formatter_command: Option<Vec<String>>,
    /// Per-cell formatter timeout in milliseconds (0 disables it)
    pub timeout: Option<u64>,
    pub exclude: Option<Vec<String>>,
    pub respect_gitignore: Option<bool>,
    /// Extra regular expressions marking lines the formatter must not see
    pub magic_patterns: Option<Vec<String>>,
    pub show_invalid_code: Option<bool>,
}

impl FileConfig {
    /// Overlay `other` on top of `self`; values set in `other` win.
    pub fn merge(&mut self, other: FileConfig) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        overlay!(
            line_length,
            skip_string_normalization,
            target_version,
            pyi,
            workers,
            formatter,
            formatter_command,
            timeout,
            exclude,
            respect_gitignore,
            magic_patterns,
            show_invalid_code
        );
    }
}

/// The style keys nbfmt understands in black's own `[tool.black]` table.
///
/// Target versions stay strings here: black may know versions nbfmt does not.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct BlackSection {
    line_length: Option<usize>,
    skip_string_normalization: Option<bool>,
    target_version: Option<Vec<String>>,
    pyi: Option<bool>,
}

impl From<BlackSection> for FileConfig {
    fn from(black: BlackSection) -> Self {
        let target_version = black.target_version.map(|versions| {
            versions
                .iter()
                .filter_map(|version| match version.parse::<TargetVersion>() {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        log::warn!("[tool.black] target-version: {e}, ignoring it");
                        None
                    }
                })
                .collect()
        });
        Self {
            line_length: black.line_length,
            skip_string_normalization: black.skip_string_normalization,
            target_version,
            pyi: black.pyi,
            ..Self::default()
        }
    }
}

/// A merged configuration and the files it came from.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: FileConfig,
    pub loaded_files: Vec<String>,
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        source,
        path: path.display().to_string(),
    })
}

/// Parses an `.nbfmt.toml` file.
pub fn parse_nbfmt_toml(content: &str, path: &str) -> Result<FileConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(format!("{path}: {e}")))
}

/// Parses pyproject.toml content and extracts `[tool.black]` and `[tool.nbfmt]` if present.
pub fn parse_pyproject_toml(content: &str, path: &str) -> Result<Option<FileConfig>, ConfigError> {
    let doc: toml::Table =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(format!("{path}: Failed to parse TOML: {e}")))?;
    let Some(tool) = doc.get("tool").and_then(toml::Value::as_table) else {
        return Ok(None);
    };

    let mut config = FileConfig::default();
    let mut found = false;

    if let Some(black) = tool.get("black") {
        let black = BlackSection::deserialize(black.clone())
            .map_err(|e| ConfigError::ParseError(format!("{path}: [tool.black]: {e}")))?;
        config.merge(black.into());
        found = true;
    }
    if let Some(nbfmt) = tool.get("nbfmt") {
        let nbfmt = FileConfig::deserialize(nbfmt.clone())
            .map_err(|e| ConfigError::ParseError(format!("{path}: [tool.nbfmt]: {e}")))?;
        config.merge(nbfmt);
        found = true;
    }

    Ok(found.then_some(config))
}

/// Load configuration.
///
/// An explicit `config_path` is the only file read. Otherwise, unless
/// `search_dir` is `None`, `pyproject.toml` and then `.nbfmt.toml` /
/// `nbfmt.toml` are discovered in `search_dir`.
pub fn load_config(config_path: Option<&Path>, search_dir: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let mut loaded = LoadedConfig::default();

    if let Some(path) = config_path {
        let content = read_config_file(path)?;
        let path_str = path.display().to_string();
        let is_pyproject = path.file_name().is_some_and(|name| name == "pyproject.toml");
        let fragment = if is_pyproject {
            parse_pyproject_toml(&content, &path_str)?.unwrap_or_default()
        } else {
            parse_nbfmt_toml(&content, &path_str)?
        };
        log::debug!("[nbfmt-config] Loaded explicit config file: {path_str}");
        loaded.config.merge(fragment);
        loaded.loaded_files.push(path_str);
        return Ok(loaded);
    }

    let Some(dir) = search_dir else {
        log::debug!("[nbfmt-config] Skipping auto-discovery");
        return Ok(loaded);
    };

    let pyproject = dir.join("pyproject.toml");
    if pyproject.is_file() {
        log::debug!("[nbfmt-config] Found {}", pyproject.display());
        let path_str = pyproject.display().to_string();
        if let Some(fragment) = parse_pyproject_toml(&read_config_file(&pyproject)?, &path_str)? {
            loaded.config.merge(fragment);
            loaded.loaded_files.push(path_str);
        }
    }

    for filename in NBFMT_CONFIG_FILES {
        let candidate = dir.join(filename);
        if candidate.is_file() {
            log::debug!("[nbfmt-config] Found {}", candidate.display());
            let path_str = candidate.display().to_string();
            let fragment = parse_nbfmt_toml(&read_config_file(&candidate)?, &path_str)?;
            loaded.config.merge(fragment);
            loaded.loaded_files.push(path_str);
            break; // Load only the first one found
        }
    }

    Ok(loaded)
}

/// Process-wide settings for one run. Built once before any file is touched.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub style: StyleOptions,
    pub worker_count: usize,
    pub show_invalid_code: bool,
    pub write_back: WriteBack,
    pub show_diff: bool,
    pub formatter: FormatterCommand,
    pub timeout_ms: u64,
    pub exclude: Vec<String>,
    pub respect_gitignore: bool,
    pub magic_patterns: Vec<String>,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            style: StyleOptions::default(),
            worker_count: default_worker_count(),
            show_invalid_code: false,
            write_back: WriteBack::Format,
            show_diff: false,
            formatter: FormatterCommand::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            exclude: Vec::new(),
            respect_gitignore: true,
            magic_patterns: Vec::new(),
        }
    }
}

/// One worker per available CPU.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism().map_or(1, usize::from)
}

fn split_patterns(patterns: &str) -> Vec<String> {
    patterns
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

impl RunConfiguration {
    /// Combine CLI flags with file configuration; CLI flags win.
    pub fn resolve(args: &FormatArgs, file: &FileConfig) -> Self {
        let target_versions = if args.target_version.is_empty() {
            file.target_version.clone().unwrap_or_default()
        } else {
            args.target_version.clone()
        };

        let style = StyleOptions {
            line_length: args.line_length.or(file.line_length).unwrap_or(DEFAULT_LINE_LENGTH),
            string_normalization: !(args.skip_string_normalization || file.skip_string_normalization.unwrap_or(false)),
            target_versions: target_versions.into_iter().collect(),
            is_pyi: args.pyi || file.pyi.unwrap_or(false),
        };

        let formatter = match (args.formatter, &file.formatter_command) {
            (Some(backend), _) => FormatterCommand::Builtin(backend),
            (None, Some(command)) => FormatterCommand::Custom(command.clone()),
            (None, None) => FormatterCommand::Builtin(file.formatter.unwrap_or_default()),
        };

        let exclude = match args.exclude.as_deref() {
            Some(patterns) => split_patterns(patterns),
            None => file.exclude.clone().unwrap_or_default(),
        };

        Self {
            style,
            worker_count: args.workers.or(file.workers).unwrap_or_else(default_worker_count).max(1),
            show_invalid_code: args.show_invalid_code || file.show_invalid_code.unwrap_or(false),
            write_back: WriteBack::from_flags(args.check, args.diff),
            show_diff: args.diff,
            formatter,
            timeout_ms: file.timeout.unwrap_or(DEFAULT_TIMEOUT_MS),
            exclude,
            respect_gitignore: !args.no_respect_gitignore && file.respect_gitignore.unwrap_or(true),
            magic_patterns: file.magic_patterns.clone().unwrap_or_default(),
        }
    }
}
