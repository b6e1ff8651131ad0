//! Concurrency ceiling for an engine.
//!
//! Each evaluation holds a permit while it runs; callers beyond the ceiling
//! wait for one. Waiting happens inside the caller's deadline, so a request
//! stuck in the queue still times out like one stuck in jq.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{Engine, EngineError, Output, Program};

/// Wraps an engine so at most `max_concurrency` evaluations run at once.
pub struct BoundedEngine {
    inner: Arc<dyn Engine>,
    permits: Semaphore,
    max_concurrency: usize,
}

impl BoundedEngine {
    pub fn new(inner: Arc<dyn Engine>, max_concurrency: usize) -> Self {
        Self {
            inner,
            permits: Semaphore::new(max_concurrency),
            max_concurrency,
        }
    }

    /// Evaluations that could start right now without waiting.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

#[async_trait]
impl Engine for BoundedEngine {
    async fn run(&self, program: Program) -> Result<Output, EngineError> {
        if self.available() == 0 {
            tracing::debug!(
                max_concurrency = self.max_concurrency,
                "Evaluation queued for a free slot"
            );
        }
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| EngineError::Unavailable(io::Error::other("engine slots closed")))?;

        self.inner.run(program).await
    }
}
