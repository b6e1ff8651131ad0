//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → timeouts.rs (attach deadline, race the pipeline against it)
//!     → ... other stages ...
//!     → recovery.rs (catch handler panics, answer 500)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every request has a deadline
//! - A single request's failure never takes down the connection or process

pub mod recovery;
pub mod timeouts;

pub use timeouts::{Deadline, TimeoutPolicy};
