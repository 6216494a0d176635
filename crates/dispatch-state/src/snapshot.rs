//! Snapshot persistence
//!
//! One snapshot of the board is kept on stable storage and overwritten
//! wholesale on every accepted action. Loading is best effort: a missing or
//! unreadable snapshot yields the fresh board.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use dispatch_core::State;

/// Snapshot errors
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Snapshot not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt snapshot: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Snapshot backend unavailable: {0}")]
    Unavailable(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Durable home of the board snapshot
pub trait SnapshotStore: Send {
    /// Read the stored board exactly as written
    fn read(&self) -> PersistResult<State>;

    /// Overwrite the stored board
    fn save(&mut self, state: &State) -> PersistResult<()>;

    /// Read the stored board, falling back to [`State::initial`].
    ///
    /// A board that breaks the invariants is repaired before it is returned.
    fn load(&self) -> State {
        match self.read() {
            Ok(state) => {
                let (state, violations) = state.normalized();
                for violation in &violations {
                    tracing::warn!(%violation, "repaired stored board");
                }
                state
            }
            Err(PersistError::NotFound(path)) => {
                tracing::info!(path = %path.display(), "no snapshot yet, starting from the default board");
                State::initial()
            }
            Err(e) => {
                tracing::warn!(error = %e, "snapshot unreadable, starting from the default board");
                State::initial()
            }
        }
    }
}

/// Snapshot kept as a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSnapshot { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }

    fn io_error(&self, path: &Path, source: io::Error) -> PersistError {
        PersistError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl SnapshotStore for FileSnapshot {
    fn read(&self) -> PersistResult<State> {
        let text = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PersistError::NotFound(self.path.clone()),
            _ => self.io_error(&self.path, e),
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write to a staging file, flush it to disk, then rename it over the
    /// snapshot so readers never see a half-written document.
    fn save(&mut self, state: &State) -> PersistResult<()> {
        let json = serde_json::to_string_pretty(state)?;
        let staging = self.staging_path();

        let mut file = File::create(&staging).map_err(|e| self.io_error(&staging, e))?;
        file.write_all(json.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| self.io_error(&staging, e))?;
        drop(file);

        fs::rename(&staging, &self.path).map_err(|e| self.io_error(&self.path, e))
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    stored: Option<State>,
    writes: usize,
    failing: bool,
}

/// In-memory snapshot with a shared handle.
///
/// Clones share the same storage, so a test can keep one handle while the
/// session hub owns another and inspect every write.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        MemorySnapshot::default()
    }

    /// Start with a stored board
    pub fn with_state(state: State) -> Self {
        let snapshot = MemorySnapshot::new();
        snapshot.inner.lock().stored = Some(state);
        snapshot
    }

    /// Number of successful saves
    pub fn writes(&self) -> usize {
        self.inner.lock().writes
    }

    /// Last board saved (or seeded)
    pub fn stored(&self) -> Option<State> {
        self.inner.lock().stored.clone()
    }

    /// Make every following save fail
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }
}

impl SnapshotStore for MemorySnapshot {
    fn read(&self) -> PersistResult<State> {
        self.inner
            .lock()
            .stored
            .clone()
            .ok_or_else(|| PersistError::NotFound(PathBuf::from("<memory>")))
    }

    fn save(&mut self, state: &State) -> PersistResult<()> {
        let mut inner = self.inner.lock();
        if inner.failing {
            return Err(PersistError::Unavailable("memory snapshot set to fail".to_string()));
        }
        inner.stored = Some(state.clone());
        inner.writes += 1;
        Ok(())
    }
}
