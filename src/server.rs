//! HTTP server lifecycle
//!
//! `Starting → Running → ShuttingDown → Stopped`. The accept loop runs on its
//! own task and owns every connection task; the caller's task waits for the
//! shutdown trigger, then gives in-flight requests a bounded window to finish.

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::service::TowerToHyperService;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ServerError;

/// Pause after a failed `accept` (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Server lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// Publishes lifecycle transitions to any number of observers
#[derive(Debug)]
pub struct Lifecycle {
    tx: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::Starting);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    fn set(&self, state: LifecycleState) {
        self.tx.send_replace(state);
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Serve `app` on `listener` until `shutdown` resolves.
///
/// After the trigger, new connections are refused and in-flight requests
/// get `grace` to complete. On expiry every open connection is dropped and
/// [`ServerError::ShutdownTimeout`] is returned.
pub async fn run<F>(
    listener: TcpListener,
    app: Router,
    shutdown: F,
    grace: Duration,
    lifecycle: &Lifecycle,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send,
{
    lifecycle.set(LifecycleState::Starting);
    let addr = listener.local_addr()?;

    let stop = CancellationToken::new();
    let mut server = tokio::spawn(serve_connections(listener, app, stop.clone()));

    lifecycle.set(LifecycleState::Running);
    info!("🌐 HTTP server listening on {}", addr);

    tokio::select! {
        _ = shutdown => {}
        result = &mut server => {
            // Accept loop died before anyone asked it to stop
            lifecycle.set(LifecycleState::Stopped);
            return match result {
                Ok(()) => Err(ServerError::Serve(std::io::Error::other(
                    "server exited unexpectedly",
                ))),
                Err(e) => Err(ServerError::Join(e)),
            };
        }
    }

    lifecycle.set(LifecycleState::ShuttingDown);
    info!("🛑 Shutting down (grace period {:?})...", grace);
    stop.cancel();

    let outcome = match tokio::time::timeout(grace, &mut server).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ServerError::Join(e)),
        Err(_) => {
            warn!("In-flight requests still running after {:?}, aborting", grace);
            // Dropping the accept task drops its JoinSet, aborting every connection
            server.abort();
            let _ = server.await;
            Err(ServerError::ShutdownTimeout(grace))
        }
    };

    lifecycle.set(LifecycleState::Stopped);
    outcome
}

/// Accept connections until `stop` fires, then drain the open ones
async fn serve_connections(listener: TcpListener, app: Router, stop: CancellationToken) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };
                debug!("Accepted connection from {}", peer);
                connections.spawn(serve_connection(
                    TokioIo::new(stream),
                    TowerToHyperService::new(app.clone()),
                    stop.clone(),
                ));
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    // Refuse new connections while the open ones finish
    drop(listener);
    debug!("Draining {} open connections", connections.len());
    while connections.join_next().await.is_some() {}
}

/// Drive one HTTP connection, switching to graceful close when `stop` fires
async fn serve_connection(
    io: TokioIo<tokio::net::TcpStream>,
    service: TowerToHyperService<Router>,
    stop: CancellationToken,
) {
    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(io, service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!("Connection error: {}", e);
            }
            return;
        }
        _ = stop.cancelled() => {}
    }

    conn.as_mut().graceful_shutdown();
    if let Err(e) = conn.await {
        debug!("Connection error during shutdown: {}", e);
    }
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Unable to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Unable to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("📢 Received Ctrl+C"),
        _ = terminate => info!("📢 Received SIGTERM"),
    }
}
