//! Actor group: run long-lived tasks together and stop them together.
//!
//! Each actor is a pair of operations: `execute` blocks until the actor is
//! done, `interrupt` asks it to finish soon. `run` starts every actor and,
//! as soon as any one of them returns, interrupts all the others and waits
//! for them. The error of the first actor to fail is the group's result.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};

use crate::resilience::recovery::panic_message;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[async_trait]
pub trait Actor: Send + Sync {
    fn name(&self) -> &str;

    /// Run until finished or interrupted.
    async fn execute(&self) -> Result<(), BoxError>;

    /// Ask `execute` to return promptly. Must tolerate being called more
    /// than once and before or after `execute` has returned.
    fn interrupt(&self, cause: Option<&ActorError>);
}

#[derive(Debug, Error)]
pub enum ActorError {
    #[error("{actor} failed: {source}")]
    Failed {
        actor: String,
        #[source]
        source: BoxError,
    },

    #[error("{actor} panicked: {message}")]
    Panicked { actor: String, message: String },
}

impl ActorError {
    pub fn actor(&self) -> &str {
        match self {
            Self::Failed { actor, .. } | Self::Panicked { actor, .. } => actor,
        }
    }
}

type Finished = (usize, Result<(), ActorError>);

/// Run every actor until the first one returns, then interrupt the rest.
pub async fn run(actors: Vec<Arc<dyn Actor>>) -> Result<(), ActorError> {
    if actors.is_empty() {
        return Ok(());
    }

    let mut tasks = JoinSet::new();
    for (index, actor) in actors.iter().enumerate() {
        let actor = Arc::clone(actor);
        tasks.spawn(async move {
            let outcome = AssertUnwindSafe(actor.execute()).catch_unwind().await;
            let result = match outcome {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(ActorError::Failed {
                    actor: actor.name().to_string(),
                    source,
                }),
                Err(payload) => Err(ActorError::Panicked {
                    actor: actor.name().to_string(),
                    message: panic_message(payload.as_ref()),
                }),
            };
            (index, result)
        });
    }

    let Some(joined) = tasks.join_next().await else {
        return Ok(());
    };
    let (finished, result) = settle(joined);
    let mut first_error = result.err();

    match (finished, &first_error) {
        (Some(index), None) => {
            tracing::info!(actor = actors[index].name(), "Actor finished; stopping group")
        }
        (_, Some(err)) => tracing::error!(error = %err, "Actor failed; stopping group"),
        (None, None) => {}
    }

    for (index, actor) in actors.iter().enumerate() {
        if Some(index) != finished {
            actor.interrupt(first_error.as_ref());
        }
    }

    while let Some(joined) = tasks.join_next().await {
        let (_, result) = settle(joined);
        if let Err(err) = result {
            if first_error.is_none() {
                first_error = Some(err);
            } else {
                tracing::warn!(error = %err, "Additional actor failure during stop");
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn settle(joined: Result<Finished, JoinError>) -> (Option<usize>, Result<(), ActorError>) {
    match joined {
        Ok((index, result)) => (Some(index), result),
        // Unreachable in practice: panics are caught inside the task and
        // tasks are never aborted.
        Err(err) => (
            None,
            Err(ActorError::Panicked {
                actor: "unknown".to_string(),
                message: err.to_string(),
            }),
        ),
    }
}
