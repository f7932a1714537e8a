//! Cooperative cancellation of a run.
//!
//! Only the controlling thread listens for SIGINT. Workers never see the
//! signal; they finish the notebook they are on and the orchestrator stops
//! handing out new ones.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Shared flag telling the orchestrator to stop dispatching work.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cancel `token` when the process receives an interrupt (Ctrl-C).
///
/// The handler is registered before this returns and runs on a dedicated
/// background thread for the rest of the process.
pub fn install_interrupt_handler(token: CancellationToken) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    #[cfg(unix)]
    let mut interrupts = {
        let _guard = runtime.enter();
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?
    };

    thread::Builder::new()
        .name("nbfmt-interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    #[cfg(unix)]
                    let received = interrupts.recv().await.is_some();
                    #[cfg(not(unix))]
                    let received = tokio::signal::ctrl_c().await.is_ok();

                    if !received {
                        break;
                    }
                    log::warn!("Interrupt received, finishing notebooks already in progress");
                    token.cancel();
                }
            });
        })?;

    Ok(())
}
