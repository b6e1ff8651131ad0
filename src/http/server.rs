//! HTTP server: accept loop and connection draining.
//!
//! # Responsibilities
//! - Accept connections and serve each on its own task (HTTP/1.1 and HTTP/2)
//! - On interrupt, stop accepting and let in-flight requests finish
//! - Abort whatever is still open when the grace period runs out
//!
//! # Design Decisions
//! - The server is an actor so the lifecycle group can stop it
//! - Connections are tasks in a `JoinSet`, so a forced close is `abort_all`
//! - Draining asks hyper to finish the current request on each connection
//!   and then close, rather than cutting sockets

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::JoinSet;

use crate::lifecycle::{Actor, ActorError, BoxError, Shutdown};
use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener};

/// Pause after a failed accept (e.g. file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server was already started")]
    AlreadyStarted,
}

/// HTTP server bound to a listener, run as a lifecycle actor.
pub struct HttpServer {
    listener: Mutex<Option<Listener>>,
    local_addr: SocketAddr,
    router: Router,
    stop: Shutdown,
    grace: Duration,
    connections: ConnectionTracker,
}

impl HttpServer {
    pub fn new(listener: Listener, router: Router, grace: Duration) -> Self {
        Self {
            local_addr: listener.local_addr(),
            listener: Mutex::new(Some(listener)),
            router,
            stop: Shutdown::new(),
            grace,
            connections: ConnectionTracker::new(),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections currently being served.
    pub fn active_connections(&self) -> u64 {
        self.connections.active_count()
    }

    /// Serve until interrupted, then drain.
    pub async fn serve(&self) -> Result<(), ServerError> {
        let listener = self
            .listener
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or(ServerError::AlreadyStarted)?;

        tracing::info!(
            address = %self.local_addr,
            max_connections = listener.max_connections(),
            "HTTP server accepting connections"
        );

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                _ = self.stop.wait() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        tasks.spawn(serve_connection(
                            stream,
                            peer,
                            permit,
                            self.router.clone(),
                            self.stop.clone(),
                            self.connections.track(),
                        ));
                    }
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            available_permits = listener.available_permits(),
                            "Accept failed"
                        );
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                // Reap finished connections so the set stays small.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Closing the socket refuses new connections from here on.
        drop(listener);

        let grace_ms = self.grace.as_millis() as u64;
        tracing::info!(
            open_connections = self.active_connections(),
            grace_ms,
            "Draining connections"
        );

        let drained = tokio::time::timeout(self.grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::error!(
                remaining = tasks.len(),
                grace_ms,
                "Grace period elapsed; closing remaining connections"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[async_trait]
impl Actor for HttpServer {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self) -> Result<(), BoxError> {
        self.serve().await?;
        Ok(())
    }

    fn interrupt(&self, _cause: Option<&ActorError>) {
        if self.stop.trigger() {
            tracing::info!("HTTP server interrupted");
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    _permit: ConnectionPermit,
    router: Router,
    stop: Shutdown,
    guard: ConnectionGuard,
) {
    let builder = auto::Builder::new(TokioExecutor::new());
    let service = TowerToHyperService::new(router);
    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(err) = result {
                    tracing::debug!(
                        connection_id = %guard.id(),
                        peer = %peer,
                        error = %err,
                        "Connection ended with error"
                    );
                }
                break;
            }
            _ = stop.wait(), if !draining => {
                conn.as_mut().graceful_shutdown();
                draining = true;
            }
        }
    }
}
