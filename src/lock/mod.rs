//! Per-key mutual exclusion with TTL
//!
//! Serializes all state-changing operations on a given user.

pub mod manager;

pub use manager::{search_lock_key, stop_lock_key, InMemoryLockManager, LockManager, LockToken};
