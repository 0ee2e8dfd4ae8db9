//! Pending queue of users waiting for a partner
//!
//! FIFO waiting list keyed by user, annotated with gender and preference,
//! plus the read-only queue health signals consumed by the presentation
//! layer.

pub mod health;
pub mod store;

pub use health::{GenderBalance, HealthThresholds, QueueHealthMonitor};
pub use store::{GenderCounts, InMemoryPendingQueue, PendingQueueStore};
