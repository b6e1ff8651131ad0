//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGTERM/SIGINT (Ctrl-C elsewhere)
//! - Return from `execute` so the actor group begins stopping
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Failing to register a handler is an actor failure, so the process
//!   exits non-zero instead of running without a stop path

use async_trait::async_trait;

use super::actor::{Actor, ActorError, BoxError};
use super::shutdown::Shutdown;

/// Actor that finishes when the process is asked to terminate.
pub struct SignalWatcher {
    stop: Shutdown,
}

impl SignalWatcher {
    /// `stop` ends the watcher without a signal; triggering it is how an
    /// embedding program requests shutdown.
    pub fn new(stop: Shutdown) -> Self {
        Self { stop }
    }
}

#[async_trait]
impl Actor for SignalWatcher {
    fn name(&self) -> &str {
        "signals"
    }

    async fn execute(&self) -> Result<(), BoxError> {
        tokio::select! {
            received = wait_for_signal() => {
                let signal = received?;
                tracing::info!(signal, "Termination signal received; shutting down");
            }
            _ = self.stop.wait() => {
                tracing::debug!("Signal watcher stopped");
            }
        }
        Ok(())
    }

    fn interrupt(&self, _cause: Option<&ActorError>) {
        self.stop.trigger();
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = interrupt.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
