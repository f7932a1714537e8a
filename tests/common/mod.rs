#![allow(dead_code)]

use nbfmt_lib::cli_types::WriteBack;
use nbfmt_lib::code_formatter::{FormatError, StyleOptions};
use nbfmt_lib::config::RunConfiguration;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

/// A small, deterministic stand-in for black.
///
/// - strips trailing whitespace and trailing blank lines
/// - normalizes the first `=` of a plain assignment to ` = `
/// - rejects IPython syntax and unbalanced parentheses, like a real parser
pub fn toy_formatter(code: &str, _options: &StyleOptions) -> Result<String, FormatError> {
    let opens = code.matches('(').count();
    let closes = code.matches(')').count();
    if opens != closes {
        return Err(FormatError::Syntax(format!("Cannot parse: unbalanced parentheses ({opens} vs {closes})")));
    }

    let mut lines = Vec::new();
    for (number, line) in code.lines().enumerate() {
        let line = line.trim_end();
        if line.trim_start().starts_with(['%', '!', '?']) {
            return Err(FormatError::Syntax(format!("Cannot parse: {}:0: {line}", number + 1)));
        }
        let is_comparison = ["==", "!=", "<=", ">="].iter().any(|op| line.contains(op));
        let formatted = match line.split_once('=') {
            Some((lhs, rhs)) if !is_comparison => format!("{} = {}", lhs.trim_end(), rhs.trim_start()),
            _ => line.to_string(),
        };
        lines.push(formatted);
    }

    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

/// A run configuration for tests, with the given mode and worker count.
pub fn run_config(write_back: WriteBack, workers: usize) -> RunConfiguration {
    RunConfiguration {
        write_back,
        worker_count: workers,
        ..RunConfiguration::default()
    }
}

/// Split text into nbformat source lines.
pub fn source_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

/// Builder for notebook JSON in the layout Jupyter writes.
#[derive(Default)]
pub struct NotebookBuilder {
    cells: Vec<Value>,
    metadata: Value,
}

impl NotebookBuilder {
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            metadata: json!({
                "kernelspec": {"display_name": "Python 3", "language": "python", "name": "python3"},
                "language_info": {"name": "python", "version": "3.12.1"}
            }),
        }
    }

    pub fn code(mut self, source: &str) -> Self {
        self.cells.push(json!({
            "cell_type": "code",
            "execution_count": null,
            "id": format!("cell-{}", self.cells.len()),
            "metadata": {},
            "outputs": [],
            "source": source_lines(source)
        }));
        self
    }

    pub fn markdown(mut self, source: &str) -> Self {
        self.cells.push(json!({
            "cell_type": "markdown",
            "id": format!("cell-{}", self.cells.len()),
            "metadata": {"editable": false, "x-thirdparty": {"keep": [1, 2, 3]}},
            "source": source_lines(source)
        }));
        self
    }

    pub fn raw(mut self, source: &str) -> Self {
        self.cells.push(json!({
            "cell_type": "raw",
            "metadata": {},
            "source": source
        }));
        self
    }

    pub fn language(mut self, name: &str) -> Self {
        self.metadata = json!({"language_info": {"name": name}});
        self
    }

    pub fn value(&self) -> Value {
        json!({
            "cells": self.cells,
            "metadata": self.metadata,
            "nbformat": 4,
            "nbformat_minor": 5
        })
    }

    /// Jupyter's on-disk layout: one-space indentation and a trailing newline.
    pub fn build(&self) -> String {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        serde::Serialize::serialize(&self.value(), &mut serializer).unwrap();
        let mut text = String::from_utf8(buf).unwrap();
        text.push('\n');
        text
    }

    pub fn write_to(&self, path: &Path) -> PathBuf {
        fs::write(path, self.build()).unwrap();
        path.to_path_buf()
    }
}

/// Source text of every cell of a notebook, joined.
pub fn cell_sources(text: &str) -> Vec<String> {
    let value: Value = serde_json::from_str(text).unwrap();
    value["cells"]
        .as_array()
        .unwrap()
        .iter()
        .map(|cell| match &cell["source"] {
            Value::String(s) => s.clone(),
            Value::Array(lines) => lines.iter().map(|l| l.as_str().unwrap()).collect(),
            _ => String::new(),
        })
        .collect()
}
