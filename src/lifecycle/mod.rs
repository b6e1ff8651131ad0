//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Store → Template → Metrics → Bind listener → Application
//!
//! Run (actor.rs):
//!     [signal watcher, http server] run together; the first to return
//!     interrupts the other
//!
//! Shutdown:
//!     SIGTERM/SIGINT → watcher returns → server interrupted
//!         → stop accepting → drain within grace → abort the rest → exit
//! ```
//!
//! # Design Decisions
//! - Fail fast at startup
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has a deadline: connections still open after the grace
//!   period are closed

pub mod actor;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use actor::{Actor, ActorError, BoxError};
pub use shutdown::Shutdown;
pub use signals::SignalWatcher;
pub use startup::{Application, ApplicationBuilder, StartupError};
