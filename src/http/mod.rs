//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept, serve, drain)
//!     → pipeline.rs (timeout, limits, headers, request id, logging, recovery)
//!     → handlers
//!     → response.rs (errors to status + JSON)
//!     → Send to client
//! ```

pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::{build_router, PipelinePolicy};
pub use request::{RequestContext, RequestId, RequestIdExt, X_REQUEST_ID};
pub use response::ApiError;
pub use server::HttpServer;
