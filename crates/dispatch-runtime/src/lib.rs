//! Dispatch Runtime - Session hub and server
//!
//! Every client action travels the same serialized path:
//! 1. Receive the frame on the client's socket
//! 2. Forward the decoded action to the hub
//! 3. Stamp fresh ids and reduce
//! 4. Commit to the canonical store
//! 5. Persist the snapshot
//! 6. Broadcast the new board to every session, sender included

pub mod config;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod hub;
pub mod server;

pub use config::*;
pub use logging::*;
pub use protocol::*;
pub use session::*;
pub use hub::*;
pub use server::*;
