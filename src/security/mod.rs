//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (check declared and streamed body size)
//!     → headers.rs (add security headers to the response)
//!     → Pass to correlation and logging
//! ```
//!
//! # Design Decisions
//! - Fail closed: oversized bodies never reach a handler
//! - No trust in client input

pub mod headers;
pub mod limits;

pub use headers::SecurityHeaders;
pub use limits::BodyLimit;
