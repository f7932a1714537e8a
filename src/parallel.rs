/// Parallel notebook processing for nbfmt
///
/// Each notebook is an independent task. With one worker the notebooks are
/// processed in order on the calling thread; otherwise a dedicated rayon pool
/// of exactly `worker_count` threads runs them. Results always come back in
/// input order.
use crate::file_processor::{FileResult, TaskContext, process_file};
use crate::interrupt::CancellationToken;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Configuration for parallel execution
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of worker threads; 1 disables the pool
    pub thread_count: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            thread_count: crate::config::default_worker_count(),
        }
    }
}

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// One result per processed notebook, in input order
    pub results: Vec<FileResult>,
    /// Notebooks never started because the run was cancelled
    pub skipped: Vec<PathBuf>,
    pub interrupted: bool,
}

/// File-level parallel processing for multiple notebooks
pub struct FileParallelProcessor {
    config: ParallelConfig,
}

impl FileParallelProcessor {
    pub fn new(config: ParallelConfig) -> Self {
        Self { config }
    }

    pub fn with_default_config() -> Self {
        Self::new(ParallelConfig::default())
    }

    /// Run one file task per notebook.
    ///
    /// `cancel` is checked before each task starts; a task that has started
    /// always runs to completion, including its write.
    pub fn process_files(&self, files: &[PathBuf], ctx: &TaskContext<'_>, cancel: &CancellationToken) -> RunOutcome {
        let start = Instant::now();

        let slots = if self.should_use_parallel(files) {
            match self.build_pool() {
                Ok(pool) => pool.install(|| {
                    files
                        .par_iter()
                        .map(|path| run_task(path, ctx, cancel))
                        .collect::<Vec<_>>()
                }),
                Err(e) => {
                    log::warn!("Failed to start {} worker threads ({e}), running sequentially", self.config.thread_count);
                    run_sequential(files, ctx, cancel)
                }
            }
        } else {
            run_sequential(files, ctx, cancel)
        };

        let mut outcome = RunOutcome {
            interrupted: cancel.is_cancelled(),
            ..RunOutcome::default()
        };
        for (path, slot) in files.iter().zip(slots) {
            match slot {
                Some(result) => outcome.results.push(result),
                None => outcome.skipped.push(path.clone()),
            }
        }

        log::debug!(
            "Processed {} notebook(s) in {:?} ({} skipped)",
            outcome.results.len(),
            start.elapsed(),
            outcome.skipped.len()
        );
        outcome
    }

    /// Whether a thread pool is worth starting for `files`
    pub fn should_use_parallel(&self, files: &[PathBuf]) -> bool {
        self.config.thread_count > 1 && files.len() > 1
    }

    fn build_pool(&self) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.thread_count)
            .thread_name(|index| format!("nbfmt-worker-{index}"))
            .build()
    }
}

fn run_task(path: &Path, ctx: &TaskContext<'_>, cancel: &CancellationToken) -> Option<FileResult> {
    if cancel.is_cancelled() {
        return None;
    }
    Some(process_file(path, ctx))
}

fn run_sequential(files: &[PathBuf], ctx: &TaskContext<'_>, cancel: &CancellationToken) -> Vec<Option<FileResult>> {
    files.iter().map(|path| run_task(path, ctx, cancel)).collect()
}
