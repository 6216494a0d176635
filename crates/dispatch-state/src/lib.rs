//! Dispatch State Engine - Reducer, canonical store and persistence
//!
//! This crate implements the board's state pipeline:
//! - Pure action reducer
//! - Canonical store owning the live board and the id allocator
//! - Snapshot persistence (file and in-memory backends)

pub mod reducer;
pub mod store;
pub mod snapshot;

pub use reducer::*;
pub use store::*;
pub use snapshot::*;
