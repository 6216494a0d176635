//! WebSocket and HTTP front end
//!
//! Each WebSocket connection gets a bounded outbound queue drained by a
//! writer task; inbound frames are decoded and forwarded to the hub.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dispatch_state::SnapshotStore;

use crate::{spawn_hub, ClientFrame, ConfigError, HubHandle, HubStats, ServerConfig, SessionManager, SyncFrame};

/// Runtime errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("session hub failed: {0}")]
    Hub(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Clone)]
struct AppState {
    hub: HubHandle,
    session_buffer: usize,
}

/// Routes: `GET /ws` (board sync) and `GET /api/ping` (health check)
pub fn router(hub: HubHandle, session_buffer: usize) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/ping", get(ping))
        .with_state(AppState {
            hub,
            session_buffer,
        })
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, app.hub, app.session_buffer))
}

/// Drive one WebSocket connection to completion
async fn serve_socket(socket: WebSocket, hub: HubHandle, buffer: usize) {
    let (mut sink, mut source) = socket.split();
    let (outbox, mut frames) = mpsc::channel::<SyncFrame>(buffer);

    let session = match hub.connect(outbox).await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "rejecting connection");
            return;
        }
    };

    // Ends when the hub drops the session's outbox or the peer goes away
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if sink.send(Message::Text(frame.to_string())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => match ClientFrame::decode(&text) {
                    Ok(ClientFrame::Action(action)) => {
                        if hub.submit(session, action).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!(%session, error = %e, "ignoring frame"),
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = &mut writer => break,
        }
    }

    let _ = hub.disconnect(session).await;
    writer.abort();
}

/// A bound server with its hub already running
pub struct DispatchServer {
    listener: TcpListener,
    hub: HubHandle,
    task: JoinHandle<HubStats>,
    session_buffer: usize,
}

impl DispatchServer {
    /// Load the board, start the hub and bind the listener
    pub async fn bind<S>(config: &ServerConfig, snapshot: S) -> ServerResult<Self>
    where
        S: SnapshotStore + 'static,
    {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        let manager = SessionManager::new(snapshot);
        info!(
            doctors = manager.state().doctors.len(),
            locations = manager.state().locations.len(),
            "board loaded"
        );
        let (hub, task) = spawn_hub(manager, config.hub_buffer);

        Ok(DispatchServer {
            listener,
            hub,
            task,
            session_buffer: config.session_buffer,
        })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Serve until `shutdown` resolves, then stop the hub and return its stats.
    ///
    /// Stopping the hub closes every session's queue, which ends the open
    /// sockets and lets the listener drain.
    pub async fn run<F>(self, shutdown: F) -> ServerResult<HubStats>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(%addr, "dispatch server listening");

        let hub = self.hub.clone();
        let signal = async move {
            shutdown.await;
            info!("shutdown requested");
            let _ = hub.shutdown().await;
        };

        let app = router(self.hub, self.session_buffer);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(signal)
            .await?;

        self.task.await.map_err(|e| ServerError::Hub(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_state::MemorySnapshot;

    #[tokio::test]
    async fn test_bind_reports_address_in_use() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            bind_addr: taken.local_addr().unwrap(),
            ..ServerConfig::default()
        };

        let err = DispatchServer::bind(&config, MemorySnapshot::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_run_returns_hub_stats_on_shutdown() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..ServerConfig::default()
        };
        let server = DispatchServer::bind(&config, MemorySnapshot::new()).await.unwrap();
        let stats = server.run(async {}).await.unwrap();
        assert_eq!(stats, HubStats::default());
    }
}
