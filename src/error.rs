//! Error types for the matchmaking core
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

use crate::types::{PairId, UserId};

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error("another operation is already in flight for key {key}")]
    LockBusy { key: String },

    #[error("lock token mismatch for key {key}")]
    LockMismatch { key: String },

    #[error("user {user_id} already has an active conversation")]
    AlreadyPaired { user_id: UserId },

    #[error("pair not found: {pair_id}")]
    PairNotFound { pair_id: PairId },

    #[error("profile not found for user {user_id}")]
    ProfileNotFound { user_id: UserId },

    #[error("user {user_id} is not eligible to search: {reason}")]
    UserNotEligible { user_id: UserId, reason: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("candidate {user_id} was removed from the queue without a conversation being created")]
    InconsistentRemoval { user_id: UserId },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("internal service error: {message}")]
    InternalError { message: String },
}
