// Property-based tests for the notebook pipeline
// Random notebooks mixing code, markdown and raw cells are used to verify:
// 1. Parsing and serializing an untouched notebook is lossless
// 2. Formatting is idempotent
// 3. Non-code cells and cell order never change
// 4. The worker count has no influence on the results

mod common;

use common::{NotebookBuilder, run_config, toy_formatter};
use nbfmt_lib::cli_types::WriteBack;
use nbfmt_lib::file_processor::TaskContext;
use nbfmt_lib::interrupt::CancellationToken;
use nbfmt_lib::magics::MagicMatcher;
use nbfmt_lib::notebook::NotebookDocument;
use nbfmt_lib::parallel::{FileParallelProcessor, ParallelConfig};
use nbfmt_lib::process_notebook;
use proptest::prelude::*;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Clone)]
enum GeneratedCell {
    Code(String),
    Markdown(String),
    Raw(String),
}

/// Lines a notebook author might write, including IPython syntax
fn code_line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(|name| format!("{name}={name}")),
        "[a-z]{1,6}".prop_map(|name| format!("{name}  =  1   ")),
        "[a-z]{1,6}".prop_map(|name| format!("print({name})")),
        "[a-z]{1,6}".prop_map(|name| format!("if {name} == 1:")),
        "[a-z]{1,6}".prop_map(|name| format!("    {name}=2")),
        "[a-z]{1,6}".prop_map(|name| format!("%time {name}")),
        "[a-z]{1,6}".prop_map(|name| format!("!pip install {name}")),
        "[a-z]{1,6}".prop_map(|name| format!("{name}?")),
        "[a-z]{1,6}".prop_map(|name| format!("files = !ls {name}")),
        Just("# comment = kept".to_string()),
        Just("broken(".to_string()),
        Just(String::new()),
    ]
}

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[ -~]{0,30}", 0..5).prop_map(|lines| lines.join("\n"))
}

fn cell_strategy() -> impl Strategy<Value = GeneratedCell> {
    prop_oneof![
        3 => (prop::collection::vec(code_line_strategy(), 0..8), any::<bool>()).prop_map(|(lines, newline)| {
            let mut source = lines.join("\n");
            if newline && !source.is_empty() {
                source.push('\n');
            }
            GeneratedCell::Code(source)
        }),
        1 => text_strategy().prop_map(GeneratedCell::Markdown),
        1 => text_strategy().prop_map(GeneratedCell::Raw),
    ]
}

fn notebook_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(cell_strategy(), 0..6).prop_map(|cells| {
        cells
            .iter()
            .fold(NotebookBuilder::new(), |builder, cell| match cell {
                GeneratedCell::Code(source) => builder.code(source),
                GeneratedCell::Markdown(source) => builder.markdown(source),
                GeneratedCell::Raw(source) => builder.raw(source),
            })
            .build()
    })
}

fn format(text: &str) -> (String, bool) {
    let config = run_config(WriteBack::Format, 1);
    let magics = MagicMatcher::new();
    let ctx = TaskContext {
        config: &config,
        formatter: &toy_formatter,
        magics: &magics,
    };
    let outcome = process_notebook(text, &ctx).unwrap();
    (outcome.formatted, outcome.changed)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn untouched_documents_round_trip(text in notebook_strategy()) {
        let document = NotebookDocument::parse(text.clone()).unwrap();
        prop_assert_eq!(document.serialize().unwrap(), text);
    }

    #[test]
    fn formatting_is_idempotent(text in notebook_strategy()) {
        let (once, _) = format(&text);
        let (twice, changed) = format(&once);
        prop_assert!(!changed);
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn non_code_cells_survive(text in notebook_strategy()) {
        let (formatted, _) = format(&text);
        let before: Value = serde_json::from_str(&text).unwrap();
        let after: Value = serde_json::from_str(&formatted).unwrap();
        let before_cells = before["cells"].as_array().unwrap();
        let after_cells = after["cells"].as_array().unwrap();

        prop_assert_eq!(before_cells.len(), after_cells.len());
        for (old, new) in before_cells.iter().zip(after_cells) {
            prop_assert_eq!(&old["cell_type"], &new["cell_type"]);
            if old["cell_type"] != "code" {
                prop_assert_eq!(old, new);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn worker_count_does_not_matter(
        notebooks in prop::collection::vec(notebook_strategy(), 1..6),
        workers in 2usize..5,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = notebooks
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let path = dir.path().join(format!("nb{i}.ipynb"));
                std::fs::write(&path, text).unwrap();
                path
            })
            .collect();

        let magics = MagicMatcher::new();
        let run = |count: usize| {
            let config = run_config(WriteBack::Check, count);
            let ctx = TaskContext {
                config: &config,
                formatter: &toy_formatter,
                magics: &magics,
            };
            FileParallelProcessor::new(ParallelConfig { thread_count: count })
                .process_files(&files, &ctx, &CancellationToken::new())
                .results
        };

        prop_assert_eq!(run(1), run(workers));
    }
}
