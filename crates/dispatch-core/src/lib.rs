//! Dispatch Core - Fundamental types of the dispatch board
//!
//! This crate defines the types shared by every other dispatch crate:
//! - Identifiers (EntityId, SessionId) and the id allocator
//! - The board model (Doctor, Location, Assignments, State)
//! - Actions, the closed set of state transformations
//! - Invariant checking and repair
//! - Error types

pub mod id;
pub mod model;
pub mod action;
pub mod invariants;
pub mod error;

pub use id::*;
pub use model::*;
pub use action::*;
pub use invariants::*;
pub use error::*;
