//! Evaluation engine subsystem.
//!
//! # Data Flow
//! ```text
//! handler (validated query + input + options)
//!     → Program
//!     → Engine::run (bounded.rs waits for a slot,
//!                    process.rs spawns jq, feeds stdin, collects output)
//!     → Output | EngineError
//! ```
//!
//! # Design Decisions
//! - The engine is a trait object so handlers can be tested with doubles
//! - Deadlines are applied by the caller; dropping the `run` future must
//!   abandon the evaluation (the jq child is killed on drop)

pub mod bounded;
pub mod options;
pub mod process;

use async_trait::async_trait;
use thiserror::Error;

pub use bounded::BoundedEngine;
pub use options::JqOption;
pub use process::JqProcess;

/// A filter expression with its input, ready to evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub query: String,
    pub input: String,
    pub options: Vec<JqOption>,
}

/// Successful evaluation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Everything jq wrote to stdout, followed by any diagnostics it wrote to
    /// stderr (e.g. `debug` messages).
    pub text: String,
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// The filter did not compile.
    #[error("{0}")]
    Compile(String),

    /// The filter compiled but failed while running (includes invalid input).
    #[error("{0}")]
    Runtime(String),

    /// The output exceeded the configured ceiling.
    #[error("output exceeds {limit} bytes")]
    OutputTooLarge { limit: usize },

    /// The engine could not be started.
    #[error("evaluation engine unavailable: {0}")]
    Unavailable(#[source] std::io::Error),
}

impl EngineError {
    /// Short machine-readable kind used in response bodies and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Compile(_) => "syntax",
            EngineError::Runtime(_) => "runtime",
            EngineError::OutputTooLarge { .. } => "output_too_large",
            EngineError::Unavailable(_) => "engine_unavailable",
        }
    }
}

/// Something that can evaluate a jq program.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn run(&self, program: Program) -> Result<Output, EngineError>;
}
