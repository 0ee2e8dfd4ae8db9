//! Conversation pair records and their lifecycle
//!
//! A pair moves `Active -> Ended` exactly once; a new conversation is always
//! a new pair.

pub mod store;

pub use store::{EndOutcome, InMemoryPairStore, PairStore};
