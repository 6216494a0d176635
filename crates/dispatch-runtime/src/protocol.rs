//! Wire protocol
//!
//! Every WebSocket text message is an envelope `{"event": ..., "data": ...}`:
//! - `sync` (server → client): `data` is the full board
//! - `action` (client → server): `data` is `{"type": ..., "payload": ...}`

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use dispatch_core::{Action, DispatchError, DispatchResult, State};

pub const SYNC_EVENT: &str = "sync";
pub const ACTION_EVENT: &str = "action";

/// Encoded `sync` envelope, shared by every session it is sent to
pub type SyncFrame = Arc<str>;

/// Frames the server sends
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerFrame {
    Sync(State),
}

/// Frames clients send
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientFrame {
    Action(Action),
}

#[derive(Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
enum SyncRef<'a> {
    Sync(&'a State),
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Encode the board as a `sync` envelope
pub fn encode_sync(state: &State) -> DispatchResult<SyncFrame> {
    let text = serde_json::to_string(&SyncRef::Sync(state))?;
    Ok(Arc::from(text))
}

impl ServerFrame {
    pub fn decode(text: &str) -> DispatchResult<Self> {
        serde_json::from_str(text).map_err(|e| DispatchError::InvalidFrame(e.to_string()))
    }
}

impl ClientFrame {
    /// Decode a client message.
    ///
    /// Any non-null `data` is accepted as an action: unknown kinds and bad
    /// shapes decode to no-op actions rather than errors, so the sender still
    /// gets its confirming sync.
    pub fn decode(text: &str) -> DispatchResult<Self> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| DispatchError::InvalidFrame(e.to_string()))?;

        match envelope.event.as_str() {
            ACTION_EVENT if envelope.data.is_null() => Err(DispatchError::InvalidFrame(
                "action event without data".to_string(),
            )),
            ACTION_EVENT => Ok(ClientFrame::Action(Action::from_wire(envelope.data))),
            _ => Err(DispatchError::UnknownEvent(envelope.event)),
        }
    }

    pub fn encode(&self) -> DispatchResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
