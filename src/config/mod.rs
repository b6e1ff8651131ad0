//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → config file (TOML, optional)
//!     → overrides (CLI flags / environment)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared by value with each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; never re-read after startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, Overrides};
pub use schema::AppConfig;
pub use schema::EngineConfig;
pub use schema::FetchConfig;
pub use schema::ListenerConfig;
pub use schema::Mode;
pub use schema::ObservabilityConfig;
