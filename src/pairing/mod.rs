//! Pairing orchestration
//!
//! The transactional sequence that turns search requests into conversations:
//! lock, precondition checks, candidate claim, pair creation (with a
//! compensating re-enqueue on failure), and the stop/next/cleanup flows.

pub mod manager;

pub use manager::{
    CleanupReport, PairingManager, PairingStats, QueueStatus, StartOutcome, StopOutcome,
};
