use anyhow::Context;
use clap::Parser;
use colored::*;
use std::io::{self, Write};
use std::path::Path;

use nbfmt_lib::cli_types::FormatArgs;
use nbfmt_lib::code_formatter::ExternalFormatter;
use nbfmt_lib::config::{self, RunConfiguration};
use nbfmt_lib::exit_codes;
use nbfmt_lib::file_processor::{DiscoveryOptions, TaskContext, collect_notebooks};
use nbfmt_lib::interrupt::{CancellationToken, install_interrupt_handler};
use nbfmt_lib::magics::MagicMatcher;
use nbfmt_lib::output;
use nbfmt_lib::parallel::{FileParallelProcessor, ParallelConfig};

#[derive(Parser)]
#[command(author, version, about = "Format the code cells of Jupyter notebooks", long_about = None)]
struct Cli {
    #[command(flatten)]
    args: FormatArgs,
}

fn init_logging(args: &FormatArgs) {
    let level = if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(args: &FormatArgs) -> anyhow::Result<i32> {
    // --config loads exactly one file; --no-config loads none
    let search_dir = (!args.no_config).then(|| Path::new("."));
    let loaded = config::load_config(args.config.as_deref().map(Path::new), search_dir)?;
    for file in &loaded.loaded_files {
        log::debug!("Using configuration from {file}");
    }

    let config = RunConfiguration::resolve(args, &loaded.config);
    log::debug!("Run configuration: {config:?}");

    let magics = MagicMatcher::with_patterns(&config.magic_patterns).context("invalid magic-patterns")?;

    let files = collect_notebooks(
        &args.targets,
        &DiscoveryOptions {
            exclude: &config.exclude,
            respect_gitignore: config.respect_gitignore,
        },
    )?;
    if files.is_empty() {
        if !args.quiet {
            println!("No notebooks are present to be formatted. Nothing to do.");
        }
        return Ok(exit_codes::SUCCESS);
    }

    let formatter = ExternalFormatter::new(config.formatter.clone(), config.timeout_ms);
    formatter.check_available()?;

    let cancel = CancellationToken::new();
    if let Err(e) = install_interrupt_handler(cancel.clone()) {
        log::warn!("Could not install interrupt handler: {e}");
    }

    let ctx = TaskContext {
        config: &config,
        formatter: &formatter,
        magics: &magics,
    };
    let processor = FileParallelProcessor::new(ParallelConfig {
        thread_count: config.worker_count,
    });
    let outcome = processor.process_files(&files, &ctx, &cancel);

    let mut stdout = io::stdout().lock();
    let mut sink = io::sink();
    let out: &mut dyn Write = if args.quiet { &mut sink } else { &mut stdout };
    let code = output::report(&outcome, &config, out, &mut io::stderr().lock())?;
    Ok(code)
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.args);

    match run(&cli.args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {e:#}", "error".red().bold());
            std::process::exit(exit_codes::TOOL_ERROR);
        }
    }
}
