//! Session hub
//!
//! A single thread from tokio's blocking pool owns the [`SessionManager`].
//! Connections talk to it through a bounded command queue, so actions are
//! applied strictly one at a time in arrival order. Snapshot writes block
//! that thread only, never the async workers serving sockets.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use dispatch_core::{Action, DispatchError, DispatchResult, SessionId};
use dispatch_state::SnapshotStore;

use crate::{HubStats, Outbox, SessionManager};

/// Commands accepted by the hub
#[derive(Debug)]
pub enum HubCommand {
    Connect {
        outbox: Outbox,
        reply: oneshot::Sender<SessionId>,
    },
    Action {
        session: SessionId,
        action: Action,
    },
    Disconnect {
        session: SessionId,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
    Shutdown,
}

/// Cloneable handle to a running hub
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Register a session; its initial sync is queued on `outbox` before
    /// this returns
    pub async fn connect(&self, outbox: Outbox) -> DispatchResult<SessionId> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Connect { outbox, reply }).await?;
        rx.await.map_err(|_| DispatchError::HubStopped)
    }

    pub async fn submit(&self, session: SessionId, action: Action) -> DispatchResult<()> {
        self.send(HubCommand::Action { session, action }).await
    }

    pub async fn disconnect(&self, session: SessionId) -> DispatchResult<()> {
        self.send(HubCommand::Disconnect { session }).await
    }

    pub async fn stats(&self) -> DispatchResult<HubStats> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Stats { reply }).await?;
        rx.await.map_err(|_| DispatchError::HubStopped)
    }

    /// Ask the hub to stop once queued commands are handled
    pub async fn shutdown(&self) -> DispatchResult<()> {
        self.send(HubCommand::Shutdown).await
    }

    async fn send(&self, command: HubCommand) -> DispatchResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| DispatchError::HubStopped)
    }
}

/// Start the hub on a blocking thread.
///
/// Must be called from within a tokio runtime.
pub fn spawn_hub<S>(manager: SessionManager<S>, buffer: usize) -> (HubHandle, JoinHandle<HubStats>)
where
    S: SnapshotStore + 'static,
{
    let (tx, rx) = mpsc::channel(buffer);
    let task = tokio::task::spawn_blocking(move || run_hub(manager, rx));
    (HubHandle { tx }, task)
}

/// Process commands until shutdown or until every handle is dropped.
///
/// Blocks the calling thread; never call it from an async task.
pub fn run_hub<S: SnapshotStore>(
    mut manager: SessionManager<S>,
    mut rx: mpsc::Receiver<HubCommand>,
) -> HubStats {
    info!("session hub started");

    while let Some(command) = rx.blocking_recv() {
        match command {
            HubCommand::Connect { outbox, reply } => {
                let session = manager.connect(outbox);
                if reply.send(session).is_err() {
                    // Caller went away before learning its id
                    manager.disconnect(session);
                }
            }
            HubCommand::Action { session, action } => {
                if !manager.is_connected(session) {
                    debug!(%session, "action from a session that already left");
                }
                manager.handle_action(session, action);
            }
            HubCommand::Disconnect { session } => {
                manager.disconnect(session);
            }
            HubCommand::Stats { reply } => {
                let _ = reply.send(manager.stats().clone());
            }
            HubCommand::Shutdown => break,
        }
    }

    let stats = manager.stats().clone();
    info!(
        actions = stats.actions_applied,
        sessions = manager.session_count(),
        "session hub stopped"
    );
    stats
}
