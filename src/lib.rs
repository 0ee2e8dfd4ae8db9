//! Rendezvous - Matchmaking core for anonymous one-on-one chats
//!
//! This crate pairs waiting users into one-on-one conversations with
//! per-user mutual exclusion, FIFO-fair queueing, strict/random match
//! policies, and background cleanup of stale state.

pub mod config;
pub mod error;
pub mod lock;
pub mod matching;
pub mod metrics;
pub mod notify;
pub mod pair;
pub mod pairing;
pub mod profile;
pub mod queue;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchingError, Result};
pub use types::*;

// Re-export key components
pub use notify::Notifier;
pub use pairing::{PairingManager, StartOutcome, StopOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
