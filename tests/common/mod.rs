//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jqplay::config::{AppConfig, Mode};
use jqplay::engine::{Engine, EngineError, Output, Program};
use jqplay::lifecycle::{ActorError, Application, Shutdown};
use jqplay::storage::{MemoryStore, SnippetStore};
use tokio::task::JoinHandle;

/// Engine double driven by the query text:
/// - `sleep:<ms>` waits that long, then echoes the input
/// - `panic` panics
/// - `syntax error` fails to compile
/// - `runtime error` fails while running
/// - anything else echoes `<query> <input>`
pub struct ScriptedEngine;

#[async_trait]
impl Engine for ScriptedEngine {
    async fn run(&self, program: Program) -> Result<Output, EngineError> {
        if let Some(ms) = program.query.strip_prefix("sleep:") {
            let ms: u64 = ms.trim().parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            return Ok(Output {
                text: program.input,
            });
        }
        match program.query.as_str() {
            "panic" => panic!("scripted engine panic"),
            "syntax error" => Err(EngineError::Compile(
                "jq: error: syntax error, unexpected INVALID_CHARACTER".into(),
            )),
            "runtime error" => Err(EngineError::Runtime(
                "jq: error (at <stdin>:0): null (null) has no keys".into(),
            )),
            _ => Ok(Output {
                text: format!("{} {}", program.query, program.input),
            }),
        }
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.mode = Mode::Development;
    config.database_url = "memory:".into();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config
}

/// A running application on an ephemeral port.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub store: Arc<MemoryStore>,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), ActorError>>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Request shutdown and wait for the application to exit.
    pub async fn stop(self) -> Result<(), ActorError> {
        self.shutdown.trigger();
        self.handle.await.expect("application task panicked")
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub async fn join(self) -> Result<(), ActorError> {
        self.handle.await.expect("application task panicked")
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: AppConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let app = Application::builder(config)
        .engine(Arc::new(ScriptedEngine))
        .store(Arc::clone(&store) as Arc<dyn SnippetStore>)
        .build()
        .await
        .expect("application failed to start");

    let addr = app.local_addr();
    let shutdown = app.shutdown_handle();
    let handle = tokio::spawn(app.run());

    TestApp {
        addr,
        client: reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("client"),
        store,
        shutdown,
        handle,
    }
}
