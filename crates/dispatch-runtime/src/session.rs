//! Session manager - connections, action processing and broadcast
//!
//! The manager is a plain synchronous object; the hub thread drives it one
//! command at a time, which is what serializes every mutation of the board.

use std::collections::BTreeMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use dispatch_core::{Action, SessionId, State};
use dispatch_state::{CanonicalStore, SnapshotStore};

use crate::{encode_sync, SyncFrame};

/// Sending half of a session's outbound queue
pub type Outbox = mpsc::Sender<SyncFrame>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HubStats {
    pub actions_applied: u64,
    pub saves_failed: u64,
    /// Sync frames queued for delivery, welcome frames included
    pub frames_sent: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    /// Sessions removed because their queue was full or gone
    pub sessions_dropped: u64,
}

/// Owns the board, its snapshot and every connected session
pub struct SessionManager<S: SnapshotStore> {
    store: CanonicalStore,
    snapshot: S,
    sessions: BTreeMap<SessionId, Outbox>,
    next_session: u64,
    stats: HubStats,
}

impl<S: SnapshotStore> SessionManager<S> {
    /// Start from whatever the snapshot holds
    pub fn new(snapshot: S) -> Self {
        let state = snapshot.load();
        Self::with_state(snapshot, state)
    }

    /// Start from an explicit board
    pub fn with_state(snapshot: S, state: State) -> Self {
        SessionManager {
            store: CanonicalStore::new(state),
            snapshot,
            sessions: BTreeMap::new(),
            next_session: 0,
            stats: HubStats::default(),
        }
    }

    /// Register a connection and send it the current board.
    ///
    /// No other session is notified.
    pub fn connect(&mut self, outbox: Outbox) -> SessionId {
        self.next_session += 1;
        let session = SessionId::new(self.next_session);
        self.stats.sessions_opened += 1;

        match encode_sync(self.store.current()) {
            Ok(frame) => {
                if outbox.try_send(frame).is_err() {
                    warn!(%session, "session closed before the initial sync");
                    self.stats.sessions_dropped += 1;
                    return session;
                }
                self.stats.frames_sent += 1;
            }
            Err(e) => error!(%session, error = %e, "failed to encode board"),
        }

        self.sessions.insert(session, outbox);
        info!(%session, sessions = self.sessions.len(), "session connected");
        session
    }

    /// Forget a connection; the board is untouched
    pub fn disconnect(&mut self, session: SessionId) -> bool {
        let removed = self.sessions.remove(&session).is_some();
        if removed {
            self.stats.sessions_closed += 1;
            info!(%session, sessions = self.sessions.len(), "session disconnected");
        }
        removed
    }

    /// Apply an action, persist the result, then broadcast it to everyone.
    ///
    /// The snapshot is written before any session sees the new board. A
    /// failed write is logged and the in-memory board stays authoritative.
    pub fn handle_action(&mut self, origin: SessionId, action: Action) -> &State {
        match &action {
            Action::Unknown { kind, .. } => {
                debug!(session = %origin, %kind, "unrecognized action kind, board unchanged")
            }
            Action::Malformed { kind, reason } => {
                debug!(session = %origin, %kind, %reason, "malformed action, board unchanged")
            }
            _ => debug!(session = %origin, kind = action.kind(), "applying action"),
        }

        self.store.dispatch(action);
        self.stats.actions_applied += 1;

        if let Err(e) = self.snapshot.save(self.store.current()) {
            self.stats.saves_failed += 1;
            error!(error = %e, version = self.store.version(), "failed to persist board");
        }

        self.broadcast();
        self.store.current()
    }

    /// Send the current board to every session
    fn broadcast(&mut self) {
        let frame = match encode_sync(self.store.current()) {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "failed to encode board");
                return;
            }
        };

        let mut dropped = Vec::new();
        for (session, outbox) in &self.sessions {
            match outbox.try_send(SyncFrame::clone(&frame)) {
                Ok(()) => self.stats.frames_sent += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(%session, "session queue full, dropping session");
                    dropped.push(*session);
                }
                Err(TrySendError::Closed(_)) => dropped.push(*session),
            }
        }

        for session in dropped {
            self.sessions.remove(&session);
            self.stats.sessions_dropped += 1;
        }
    }

    pub fn state(&self) -> &State {
        self.store.current()
    }

    pub fn stats(&self) -> &HubStats {
        &self.stats
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_connected(&self, session: SessionId) -> bool {
        self.sessions.contains_key(&session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::EntityId;
    use dispatch_state::MemorySnapshot;
    use tokio::sync::mpsc::Receiver;

    use crate::ServerFrame;

    fn drain(rx: &mut Receiver<SyncFrame>) -> Vec<State> {
        let mut boards = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            let ServerFrame::Sync(state) = ServerFrame::decode(&frame).unwrap();
            boards.push(state);
        }
        boards
    }

    #[test]
    fn test_connect_syncs_only_the_newcomer() {
        let mut manager = SessionManager::new(MemorySnapshot::new());
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);

        manager.connect(tx1);
        assert_eq!(drain(&mut rx1), vec![State::initial()]);

        manager.connect(tx2);
        assert_eq!(drain(&mut rx2), vec![State::initial()]);
        assert!(drain(&mut rx1).is_empty());
    }

    #[test]
    fn test_action_fans_out_to_all_sessions() {
        let snapshot = MemorySnapshot::new();
        let mut manager = SessionManager::new(snapshot.clone());
        let mut receivers = Vec::new();
        let mut sessions = Vec::new();
        for _ in 0..3 {
            let (tx, mut rx) = mpsc::channel(8);
            sessions.push(manager.connect(tx));
            drain(&mut rx);
            receivers.push(rx);
        }

        manager.handle_action(sessions[0], Action::add_doctor("Dr. Dupont", "Cardiologie"));

        let seen: Vec<Vec<State>> = receivers.iter_mut().map(drain).collect();
        assert_eq!(seen[0].len(), 1);
        assert_eq!(seen[0], seen[1]);
        assert_eq!(seen[1], seen[2]);
        assert_eq!(seen[0][0].doctors[0].name, "Dr. Dupont");
        assert_eq!(snapshot.writes(), 1);
        assert_eq!(snapshot.stored().as_ref(), Some(manager.state()));
    }

    #[test]
    fn test_disconnected_session_gets_nothing() {
        let mut manager = SessionManager::new(MemorySnapshot::new());
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        let s1 = manager.connect(tx1);
        let s2 = manager.connect(tx2);
        drain(&mut rx1);
        drain(&mut rx2);

        assert!(manager.disconnect(s2));
        assert!(!manager.disconnect(s2));
        let before = manager.state().clone();
        manager.handle_action(s1, Action::DeleteLocation(EntityId::new("absent")));

        assert_eq!(drain(&mut rx1).len(), 1);
        assert!(drain(&mut rx2).is_empty());
        assert_ne!(manager.state(), &before);
        assert_eq!(manager.stats().sessions_closed, 1);
    }

    #[test]
    fn test_failed_save_still_broadcasts() {
        let snapshot = MemorySnapshot::new();
        snapshot.set_failing(true);
        let mut manager = SessionManager::new(snapshot.clone());
        let (tx, mut rx) = mpsc::channel(8);
        let session = manager.connect(tx);
        drain(&mut rx);

        manager.handle_action(session, Action::add_location("Bloc", "other"));

        let boards = drain(&mut rx);
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].locations.len(), 4);
        assert_eq!(manager.stats().saves_failed, 1);
        assert_eq!(snapshot.writes(), 0);
    }

    #[test]
    fn test_noop_action_is_still_confirmed() {
        let snapshot = MemorySnapshot::new();
        let mut manager = SessionManager::new(snapshot.clone());
        let (tx, mut rx) = mpsc::channel(8);
        let session = manager.connect(tx);
        drain(&mut rx);

        manager.handle_action(
            session,
            Action::Unknown {
                kind: "UNDO".to_string(),
                payload: serde_json::Value::Null,
            },
        );

        assert_eq!(drain(&mut rx), vec![State::initial()]);
        assert_eq!(snapshot.writes(), 1);
    }

    #[test]
    fn test_full_or_closed_queues_are_pruned() {
        let mut manager = SessionManager::new(MemorySnapshot::new());
        let (slow_tx, _slow_rx) = mpsc::channel(1);
        let (gone_tx, gone_rx) = mpsc::channel(4);
        let (ok_tx, mut ok_rx) = mpsc::channel(4);
        let slow = manager.connect(slow_tx);
        let gone = manager.connect(gone_tx);
        let ok = manager.connect(ok_tx);
        drop(gone_rx);

        // The slow queue still holds its welcome frame
        manager.handle_action(ok, Action::add_doctor("Dr. Roux", "Urgences"));

        assert!(!manager.is_connected(slow));
        assert!(!manager.is_connected(gone));
        assert!(manager.is_connected(ok));
        assert_eq!(manager.stats().sessions_dropped, 2);
        assert_eq!(drain(&mut ok_rx).len(), 2);
    }

    #[test]
    fn test_starts_from_stored_board() {
        let mut stored = State::initial();
        stored.doctors.push(dispatch_core::Doctor {
            id: EntityId::numeric(7),
            name: "Dr. Blanc".to_string(),
            specialty: "Radiologie".to_string(),
        });
        let manager = SessionManager::new(MemorySnapshot::with_state(stored.clone()));
        assert_eq!(manager.state(), &stored);
    }
}
