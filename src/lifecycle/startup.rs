//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect the snippet store and load the page template
//! - Cap concurrent evaluations and build the fetch client when enabled
//! - Install the metrics exporter when enabled
//! - Bind the listener and assemble the actor group
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and nothing is served
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use super::actor::{self, Actor, ActorError};
use super::shutdown::Shutdown;
use super::signals::SignalWatcher;
use crate::config::AppConfig;
use crate::engine::{BoundedEngine, Engine, JqProcess};
use crate::fetch::Fetcher;
use crate::handlers::AppState;
use crate::http::{build_router, HttpServer, PipelinePolicy};
use crate::landing::{LandingPage, TemplateError};
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::storage::{self, SnippetStore, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("snippet store: {0}")]
    Store(#[from] StoreError),

    #[error("page template: {0}")]
    Template(#[from] TemplateError),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid metrics address `{0}`")]
    MetricsAddress(String),

    #[error("http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("listener: {0}")]
    Listener(#[from] ListenerError),
}

/// Assembles an [`Application`]. Engine and store default to the ones the
/// configuration names; tests inject their own.
pub struct ApplicationBuilder {
    config: AppConfig,
    engine: Option<Arc<dyn Engine>>,
    store: Option<Arc<dyn SnippetStore>>,
}

impl ApplicationBuilder {
    pub fn engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn store(mut self, store: Arc<dyn SnippetStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn build(self) -> Result<Application, StartupError> {
        let config = self.config;

        let store = match self.store {
            Some(store) => store,
            None => storage::connect(&config.database_url).await?,
        };
        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(JqProcess::new(&config.engine)));
        let engine: Arc<dyn Engine> =
            Arc::new(BoundedEngine::new(engine, config.engine.max_concurrency));
        let landing = Arc::new(LandingPage::load()?);
        let fetcher = if config.fetch.enabled {
            tracing::warn!("HTTP input sources enabled; clients can make this server fetch URLs");
            Some(Arc::new(Fetcher::new(&config.fetch)?))
        } else {
            None
        };

        if config.observability.metrics_enabled {
            let address: SocketAddr = config.observability.metrics_address.parse().map_err(|_| {
                StartupError::MetricsAddress(config.observability.metrics_address.clone())
            })?;
            metrics::init_metrics(address)?;
        }

        let policy = PipelinePolicy::from_config(&config);
        let router = build_router(
            AppState {
                engine,
                store,
                landing,
                fetcher,
            },
            &policy,
        );

        let listener = Listener::bind(&config.listener).await?;
        let server = Arc::new(HttpServer::new(
            listener,
            router,
            config.timeouts.shutdown_grace(),
        ));

        let stop = Shutdown::new();
        let signals = Arc::new(SignalWatcher::new(stop.clone()));

        tracing::info!(
            address = %server.local_addr(),
            mode = %config.mode,
            request_timeout_ms = config.timeouts.request_ms,
            max_evaluations = config.engine.max_concurrency,
            shutdown_grace_ms = config.timeouts.shutdown_grace_ms,
            "Application ready"
        );

        Ok(Application {
            server,
            signals,
            stop,
        })
    }
}

/// A fully started service, ready to run.
pub struct Application {
    server: Arc<HttpServer>,
    signals: Arc<SignalWatcher>,
    stop: Shutdown,
}

impl Application {
    pub fn builder(config: AppConfig) -> ApplicationBuilder {
        ApplicationBuilder {
            config,
            engine: None,
            store: None,
        }
    }

    pub async fn build(config: AppConfig) -> Result<Self, StartupError> {
        Self::builder(config).build().await
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Triggering the handle stops the application as a termination signal
    /// would.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.stop.clone()
    }

    /// Serve until a termination signal (or the shutdown handle), then drain.
    pub async fn run(self) -> Result<(), ActorError> {
        let actors: Vec<Arc<dyn Actor>> = vec![self.signals, self.server];
        actor::run(actors).await
    }
}
