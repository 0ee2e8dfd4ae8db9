//! Lock manager trait and the in-memory implementation
//!
//! Acquisition is a single atomic set-if-absent-with-expiry, so under
//! concurrent callers exactly one holder wins. Release verifies the caller's
//! token before deleting, so a holder that outlived its TTL cannot release a
//! lock already taken over by someone else.

use crate::error::{MatchingError, Result};
use crate::types::UserId;
use crate::utils::generate_lock_token;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Opaque proof of lock ownership, required to release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(Uuid);

/// Lock key for a user's start-search flow
pub fn search_lock_key(user_id: UserId) -> String {
    format!("search:{}", user_id)
}

/// Lock key for a user's stop flow
///
/// Scoped separately from the search key so stop and start do not deadlock
/// each other, while two concurrent starts for the same user still serialize.
pub fn stop_lock_key(user_id: UserId) -> String {
    format!("stop:{}", user_id)
}

/// Trait for per-key mutual exclusion with TTL
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Acquire the lock for `key`, failing fast with `LockBusy` when another
    /// unexpired holder exists
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<LockToken>;

    /// Release the lock for `key`, failing with `LockMismatch` when the token
    /// no longer matches the current holder
    async fn release(&self, key: &str, token: &LockToken) -> Result<()>;
}

struct LockHold {
    token: Uuid,
    expires_at: Instant,
}

/// In-memory lock manager backed by a mutex-guarded map
///
/// Swappable for an external implementation (e.g. Redis SET NX PX) behind the
/// same trait.
#[derive(Default)]
pub struct InMemoryLockManager {
    holds: Mutex<HashMap<String, LockHold>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired holds (for monitoring)
    pub fn active_holds(&self) -> usize {
        let now = Instant::now();
        self.holds
            .lock()
            .map(|holds| holds.values().filter(|h| h.expires_at > now).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<LockToken> {
        let mut holds = self
            .holds
            .lock()
            .map_err(|_| MatchingError::InternalError {
                message: "Failed to acquire lock table mutex".to_string(),
            })?;

        let now = Instant::now();
        if let Some(hold) = holds.get(key) {
            if hold.expires_at > now {
                return Err(MatchingError::LockBusy {
                    key: key.to_string(),
                }
                .into());
            }
            debug!("Lock {} expired, taking over", key);
        }

        let token = generate_lock_token();
        holds.insert(
            key.to_string(),
            LockHold {
                token,
                expires_at: now + ttl,
            },
        );

        Ok(LockToken(token))
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<()> {
        let mut holds = self
            .holds
            .lock()
            .map_err(|_| MatchingError::InternalError {
                message: "Failed to acquire lock table mutex".to_string(),
            })?;

        match holds.get(key) {
            Some(hold) if hold.token == token.0 => {
                holds.remove(key);
                Ok(())
            }
            _ => Err(MatchingError::LockMismatch {
                key: key.to_string(),
            }
            .into()),
        }
    }
}
