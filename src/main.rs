//! jqplay server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net::listener ──▶ http::server ──▶ http::pipeline ──▶ handlers
//!                                                                         │
//!                                   ┌─────────────────────────────────────┤
//!                                   ▼                                     ▼
//!                            engine (jq process)              storage (memory | sqlite)
//!
//!     lifecycle: [signal watcher, http server] actor group
//! ```

use std::path::PathBuf;

use clap::Parser;

use jqplay::config::{self, Mode, Overrides};
use jqplay::observability::logging;
use jqplay::Application;

#[derive(Debug, Parser)]
#[command(name = "jqplay", version, about = "A playground for jq")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "JQPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Snippet store: `memory:` or `sqlite:<path>`.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// `production` or `development`.
    #[arg(long, env = "JQPLAY_ENV")]
    mode: Option<Mode>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = config::loader::resolve(
        cli.config.as_deref(),
        Overrides {
            port: cli.port,
            database_url: cli.database_url,
            mode: cli.mode,
        },
    )?;

    logging::init(&config.observability, config.mode)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "jqplay starting");

    let app = Application::build(config).await.map_err(|err| {
        tracing::error!(error = %err, "Startup failed");
        err
    })?;
    app.run().await.map_err(|err| {
        tracing::error!(error = %err, "Exited with error");
        err
    })?;

    tracing::info!("Shutdown complete");
    Ok(())
}
