//! In-process board simulator
//!
//! Drives a [`SessionManager`] directly, without sockets or tasks. Every
//! simulated client owns the receiving end of its outbox and keeps the last
//! board it was sent, which is exactly what a browser client renders.

use tokio::sync::mpsc;

use dispatch_core::{Action, SessionId, State};
use dispatch_runtime::{HubStats, ServerFrame, SessionManager, SyncFrame};
use dispatch_state::MemorySnapshot;

/// Outbox capacity for simulated clients
pub const SIMULATED_BUFFER: usize = 256;

/// One connected client as seen from the outside
pub struct SimulatedClient {
    pub session: SessionId,
    frames: mpsc::Receiver<SyncFrame>,
    /// Last board received
    view: Option<State>,
    received: u64,
}

impl SimulatedClient {
    /// Drain queued frames; returns how many arrived
    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        while let Ok(frame) = self.frames.try_recv() {
            if let Ok(ServerFrame::Sync(state)) = ServerFrame::decode(&frame) {
                self.view = Some(state);
            }
            self.received += 1;
            count += 1;
        }
        count
    }

    pub fn view(&self) -> Option<&State> {
        self.view.as_ref()
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

/// Summary of a simulation run
#[derive(Clone, Debug)]
pub struct SimulationReport {
    pub stats: HubStats,
    pub snapshot_writes: usize,
    /// Connected clients whose view differs from the server board
    pub divergent: Vec<SessionId>,
}

impl SimulationReport {
    pub fn converged(&self) -> bool {
        self.divergent.is_empty()
    }
}

/// Several clients sharing one board
pub struct BoardSimulator {
    manager: SessionManager<MemorySnapshot>,
    snapshot: MemorySnapshot,
    clients: Vec<SimulatedClient>,
}

impl BoardSimulator {
    /// Fresh board with `client_count` connected clients
    pub fn new(client_count: usize) -> Self {
        Self::with_state(State::initial(), client_count)
    }

    pub fn with_state(state: State, client_count: usize) -> Self {
        let snapshot = MemorySnapshot::new();
        let manager = SessionManager::with_state(snapshot.clone(), state);
        let mut sim = BoardSimulator {
            manager,
            snapshot,
            clients: Vec::new(),
        };
        for _ in 0..client_count {
            sim.connect();
        }
        sim
    }

    /// Connect one more client; returns its index
    pub fn connect(&mut self) -> usize {
        let (outbox, frames) = mpsc::channel(SIMULATED_BUFFER);
        let session = self.manager.connect(outbox);
        let mut client = SimulatedClient {
            session,
            frames,
            view: None,
            received: 0,
        };
        client.pump();
        self.clients.push(client);
        self.clients.len() - 1
    }

    /// Disconnect a client; it keeps its last view
    pub fn disconnect(&mut self, client: usize) {
        if let Some(c) = self.clients.get(client) {
            self.manager.disconnect(c.session);
        }
    }

    /// Submit an action on behalf of a client and deliver the result
    pub fn submit(&mut self, client: usize, action: Action) -> &State {
        let origin = self
            .clients
            .get(client)
            .map(|c| c.session)
            .unwrap_or_default();
        self.manager.handle_action(origin, action);
        self.deliver();
        self.manager.state()
    }

    /// Let every client read its queue
    pub fn deliver(&mut self) -> usize {
        self.clients.iter_mut().map(SimulatedClient::pump).sum()
    }

    pub fn state(&self) -> &State {
        self.manager.state()
    }

    pub fn client(&self, client: usize) -> Option<&SimulatedClient> {
        self.clients.get(client)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn snapshot(&self) -> &MemorySnapshot {
        &self.snapshot
    }

    pub fn report(&self) -> SimulationReport {
        let board = self.manager.state();
        let divergent = self
            .clients
            .iter()
            .filter(|c| self.manager.is_connected(c.session))
            .filter(|c| c.view() != Some(board))
            .map(|c| c.session)
            .collect();

        SimulationReport {
            stats: self.manager.stats().clone(),
            snapshot_writes: self.snapshot.writes(),
            divergent,
        }
    }
}
