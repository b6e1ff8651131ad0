//! jqplay: a web playground for the jq JSON processor.
//!
//! Serves a playground page, evaluates jq filters on request (against inline
//! JSON or, when enabled, a document fetched over HTTP), and stores shared
//! snippets under short identifiers.

pub mod config;
pub mod engine;
pub mod fetch;
pub mod handlers;
pub mod http;
pub mod landing;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod storage;

pub use config::AppConfig;
pub use lifecycle::{Application, Shutdown};
