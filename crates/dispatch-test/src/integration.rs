//! End-to-end scenarios over the async hub
//!
//! Scenarios that verify the complete session flow with real tasks:
//! - Concurrent clients converging on one board
//! - Total ordering of actions from many senders
//! - Late joiners receiving the current board

use tokio::sync::mpsc;

use dispatch_core::{Action, SessionId, State};
use dispatch_runtime::{spawn_hub, HubHandle, ServerFrame, SessionManager, SyncFrame};
use dispatch_state::MemorySnapshot;

/// Outcome of an integration scenario
#[derive(Debug)]
pub struct IntegrationTestResult {
    /// Final server board
    pub board: State,
    /// Last board seen by each client
    pub views: Vec<State>,
    /// Frames each client received, welcome frame included
    pub frames: Vec<usize>,
    pub snapshot_writes: usize,
    pub invariants_hold: bool,
}

impl IntegrationTestResult {
    pub fn converged(&self) -> bool {
        self.views.iter().all(|view| view == &self.board)
    }

    pub fn passed(&self) -> bool {
        self.converged() && self.invariants_hold
    }
}

/// Client end of a hub session
pub struct HubClient {
    pub session: SessionId,
    hub: HubHandle,
    frames: mpsc::Receiver<SyncFrame>,
}

impl HubClient {
    pub async fn join(hub: &HubHandle, buffer: usize) -> Option<Self> {
        let (outbox, frames) = mpsc::channel(buffer);
        let session = hub.connect(outbox).await.ok()?;
        Some(HubClient {
            session,
            hub: hub.clone(),
            frames,
        })
    }

    pub async fn send(&self, action: Action) -> bool {
        self.hub.submit(self.session, action).await.is_ok()
    }

    /// Wait for the next board
    pub async fn next_board(&mut self) -> Option<State> {
        let frame = self.frames.recv().await?;
        match ServerFrame::decode(&frame).ok()? {
            ServerFrame::Sync(state) => Some(state),
        }
    }
}

/// `client_count` clients each add `actions_per_client` doctors concurrently.
///
/// Every client reads until it has seen one sync per action in total, so
/// each must end on the same board.
pub async fn run_concurrent_clients(
    client_count: usize,
    actions_per_client: usize,
) -> IntegrationTestResult {
    let snapshot = MemorySnapshot::new();
    let buffer = client_count * actions_per_client + 1;
    let (hub, task) = spawn_hub(SessionManager::new(snapshot.clone()), buffer);

    let mut clients = Vec::new();
    for _ in 0..client_count {
        if let Some(client) = HubClient::join(&hub, buffer).await {
            clients.push(client);
        }
    }

    let total = client_count * actions_per_client;
    let mut workers = Vec::new();
    for (n, mut client) in clients.into_iter().enumerate() {
        workers.push(tokio::spawn(async move {
            let mut frames = 0;
            let mut view = client.next_board().await;
            if view.is_some() {
                frames += 1;
            }
            for i in 0..actions_per_client {
                client
                    .send(Action::add_doctor(format!("Dr. {n}-{i}"), "Urgences"))
                    .await;
            }
            for _ in 0..total {
                match client.next_board().await {
                    Some(board) => {
                        view = Some(board);
                        frames += 1;
                    }
                    None => break,
                }
            }
            (view.unwrap_or_default(), frames)
        }));
    }

    let mut views = Vec::new();
    let mut frames = Vec::new();
    for worker in workers {
        if let Ok((view, count)) = worker.await {
            views.push(view);
            frames.push(count);
        }
    }

    let _ = hub.shutdown().await;
    let _ = task.await;

    let board = snapshot.stored().unwrap_or_default();
    IntegrationTestResult {
        invariants_hold: board.check_invariants().is_empty(),
        board,
        views,
        frames,
        snapshot_writes: snapshot.writes(),
    }
}

/// One client edits, a second joins afterwards and must start in sync
pub async fn run_late_joiner() -> IntegrationTestResult {
    let snapshot = MemorySnapshot::new();
    let (hub, task) = spawn_hub(SessionManager::new(snapshot.clone()), 16);

    let mut views = Vec::new();
    let mut frames = Vec::new();

    if let Some(mut first) = HubClient::join(&hub, 16).await {
        first.next_board().await;
        first.send(Action::add_location("Bloc D", "intervention")).await;
        first.send(Action::add_doctor("Dr. Fabre", "Anesthésie")).await;
        first.next_board().await;
        if let Some(board) = first.next_board().await {
            views.push(board);
            frames.push(3);
        }
    }

    if let Some(mut late) = HubClient::join(&hub, 16).await {
        if let Some(board) = late.next_board().await {
            views.push(board);
            frames.push(1);
        }
    }

    let _ = hub.shutdown().await;
    let _ = task.await;

    let board = snapshot.stored().unwrap_or_default();
    IntegrationTestResult {
        invariants_hold: board.check_invariants().is_empty(),
        board,
        views,
        frames,
        snapshot_writes: snapshot.writes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_clients_converge() {
        let result = run_concurrent_clients(4, 5).await;
        assert!(result.passed(), "{result:?}");
        assert_eq!(result.views.len(), 4);
        assert_eq!(result.board.doctors.len(), 20);
        assert_eq!(result.snapshot_writes, 20);
        assert!(result.frames.iter().all(|&n| n == 21));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ids_are_unique() {
        let result = run_concurrent_clients(8, 10).await;
        assert!(result.passed());

        let mut ids: Vec<_> = result.board.doctors.iter().map(|d| d.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 80);
    }

    #[tokio::test]
    async fn test_late_joiner_starts_in_sync() {
        let result = run_late_joiner().await;
        assert!(result.passed(), "{result:?}");
        assert_eq!(result.views.len(), 2);
        assert_eq!(result.board.locations.len(), 4);
        assert_eq!(result.snapshot_writes, 2);
    }
}
