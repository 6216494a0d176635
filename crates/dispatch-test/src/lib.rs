//! Dispatch Test Harness - Simulation and fuzzing of the shared board
//!
//! This crate provides:
//! - An in-process multi-client simulator driving the session manager
//! - A seeded random action fuzzer with invariant and convergence checks
//! - End-to-end scenarios over the async hub

pub mod simulator;
pub mod state_fuzzer;
pub mod integration;

pub use simulator::*;
pub use state_fuzzer::*;
pub use integration::*;
