//! Pair store trait and the in-memory implementation
//!
//! The store owns the one-active-pair-per-user invariant: `create_active`
//! rejects a participant who already has an active conversation, and the
//! active-pair index is kept in lockstep with pair state.

use crate::error::{MatchingError, Result};
use crate::types::{EndReason, Pair, PairId, PairStatus, UserId};
use crate::utils::{current_timestamp, generate_pair_id};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Result of an `end` call
#[derive(Debug, Clone)]
pub enum EndOutcome {
    /// The pair transitioned to ended
    Ended(Pair),
    /// The pair was already ended; nothing was mutated
    AlreadyEnded(Pair),
}

impl EndOutcome {
    pub fn pair(&self) -> &Pair {
        match self {
            EndOutcome::Ended(pair) | EndOutcome::AlreadyEnded(pair) => pair,
        }
    }
}

/// Trait for the record of conversations and their lifecycle
#[async_trait]
pub trait PairStore: Send + Sync {
    /// Create an active pair between two distinct users.
    ///
    /// Fails with `AlreadyPaired` when either participant already has an
    /// active conversation.
    async fn create_active(&self, user_id: UserId, partner_id: UserId) -> Result<Pair>;

    /// Fetch a pair by id
    async fn get(&self, pair_id: PairId) -> Result<Option<Pair>>;

    /// The active pair involving `user_id`, if one exists
    async fn find_active_by_user(&self, user_id: UserId) -> Result<Option<Pair>>;

    /// End a pair. Ending an already-ended pair is a reported no-op that does
    /// not alter `ended_at`.
    async fn end(
        &self,
        pair_id: PairId,
        ended_by: Option<UserId>,
        reason: EndReason,
    ) -> Result<EndOutcome>;

    /// Active pairs with no message activity for at least `inactive`
    async fn find_stale_active(&self, inactive: Duration) -> Result<Vec<Pair>>;

    /// Active pairs older than `max_duration`
    async fn find_expired_active(&self, max_duration: Duration) -> Result<Vec<Pair>>;

    /// Increment the message count and bump `last_message_at`
    async fn record_message(&self, pair_id: PairId) -> Result<()>;

    /// Record a 1-5 rating left by one participant
    async fn rate(&self, pair_id: PairId, rater: UserId, score: u8) -> Result<()>;

    /// Distinct partners `user_id` was paired with since `since`
    async fn recent_partners(&self, user_id: UserId, since: DateTime<Utc>) -> Result<Vec<UserId>>;

    /// Physically delete ended pairs whose `ended_at` precedes `cutoff`.
    ///
    /// Returns the number of pairs removed. Active pairs are never deleted.
    async fn purge_ended_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

#[derive(Default)]
struct PairTable {
    pairs: HashMap<PairId, Pair>,
    active_by_user: HashMap<UserId, PairId>,
}

/// In-memory pair store backed by a `RwLock`-guarded table
#[derive(Default)]
pub struct InMemoryPairStore {
    table: RwLock<PairTable>,
}

impl InMemoryPairStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_table(&self) -> Result<std::sync::RwLockReadGuard<'_, PairTable>> {
        self.table.read().map_err(|_| {
            MatchingError::InternalError {
                message: "Failed to acquire pair table lock".to_string(),
            }
            .into()
        })
    }

    fn write_table(&self) -> Result<std::sync::RwLockWriteGuard<'_, PairTable>> {
        self.table.write().map_err(|_| {
            MatchingError::InternalError {
                message: "Failed to acquire pair table lock".to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl PairStore for InMemoryPairStore {
    async fn create_active(&self, user_id: UserId, partner_id: UserId) -> Result<Pair> {
        if user_id == partner_id {
            return Err(MatchingError::InvalidRequest {
                reason: format!("user {} cannot be paired with themself", user_id),
            }
            .into());
        }

        let mut table = self.write_table()?;

        for participant in [user_id, partner_id] {
            if table.active_by_user.contains_key(&participant) {
                return Err(MatchingError::AlreadyPaired {
                    user_id: participant,
                }
                .into());
            }
        }

        let now = current_timestamp();
        let pair = Pair {
            id: generate_pair_id(),
            user_id,
            partner_id,
            status: PairStatus::Active,
            started_at: now,
            ended_at: None,
            ended_by: None,
            end_reason: None,
            last_message_at: now,
            message_count: 0,
            rating_by_user: None,
            rating_by_partner: None,
        };

        table.active_by_user.insert(user_id, pair.id);
        table.active_by_user.insert(partner_id, pair.id);
        table.pairs.insert(pair.id, pair.clone());

        Ok(pair)
    }

    async fn get(&self, pair_id: PairId) -> Result<Option<Pair>> {
        let table = self.read_table()?;
        Ok(table.pairs.get(&pair_id).cloned())
    }

    async fn find_active_by_user(&self, user_id: UserId) -> Result<Option<Pair>> {
        let table = self.read_table()?;
        Ok(table
            .active_by_user
            .get(&user_id)
            .and_then(|pair_id| table.pairs.get(pair_id))
            .cloned())
    }

    async fn end(
        &self,
        pair_id: PairId,
        ended_by: Option<UserId>,
        reason: EndReason,
    ) -> Result<EndOutcome> {
        let mut table = self.write_table()?;

        let pair = table
            .pairs
            .get_mut(&pair_id)
            .ok_or(MatchingError::PairNotFound { pair_id })?;

        if pair.status == PairStatus::Ended {
            return Ok(EndOutcome::AlreadyEnded(pair.clone()));
        }

        pair.status = PairStatus::Ended;
        pair.ended_at = Some(current_timestamp());
        pair.ended_by = ended_by;
        pair.end_reason = Some(reason);
        let ended = pair.clone();

        table.active_by_user.remove(&ended.user_id);
        table.active_by_user.remove(&ended.partner_id);

        Ok(EndOutcome::Ended(ended))
    }

    async fn find_stale_active(&self, inactive: Duration) -> Result<Vec<Pair>> {
        let table = self.read_table()?;
        let cutoff = current_timestamp() - inactive;
        Ok(table
            .pairs
            .values()
            .filter(|pair| pair.status == PairStatus::Active && pair.last_message_at <= cutoff)
            .cloned()
            .collect())
    }

    async fn find_expired_active(&self, max_duration: Duration) -> Result<Vec<Pair>> {
        let table = self.read_table()?;
        let cutoff = current_timestamp() - max_duration;
        Ok(table
            .pairs
            .values()
            .filter(|pair| pair.status == PairStatus::Active && pair.started_at <= cutoff)
            .cloned()
            .collect())
    }

    async fn record_message(&self, pair_id: PairId) -> Result<()> {
        let mut table = self.write_table()?;

        let pair = table
            .pairs
            .get_mut(&pair_id)
            .ok_or(MatchingError::PairNotFound { pair_id })?;

        if pair.status == PairStatus::Active {
            pair.message_count += 1;
            pair.last_message_at = current_timestamp();
        }

        Ok(())
    }

    async fn rate(&self, pair_id: PairId, rater: UserId, score: u8) -> Result<()> {
        if !(1..=5).contains(&score) {
            return Err(MatchingError::InvalidRequest {
                reason: format!("rating {} out of range 1-5", score),
            }
            .into());
        }

        let mut table = self.write_table()?;

        let pair = table
            .pairs
            .get_mut(&pair_id)
            .ok_or(MatchingError::PairNotFound { pair_id })?;

        if rater == pair.user_id {
            pair.rating_by_user = Some(score);
        } else if rater == pair.partner_id {
            pair.rating_by_partner = Some(score);
        } else {
            return Err(MatchingError::InvalidRequest {
                reason: format!("user {} is not a participant of pair {}", rater, pair_id),
            }
            .into());
        }

        Ok(())
    }

    async fn recent_partners(&self, user_id: UserId, since: DateTime<Utc>) -> Result<Vec<UserId>> {
        let table = self.read_table()?;
        let mut partners = HashSet::new();
        for pair in table.pairs.values() {
            if pair.started_at >= since {
                if let Some(partner) = pair.partner_of(user_id) {
                    partners.insert(partner);
                }
            }
        }
        Ok(partners.into_iter().collect())
    }

    async fn purge_ended_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut table = self.write_table()?;
        let doomed: Vec<PairId> = table
            .pairs
            .values()
            .filter(|pair| {
                pair.status == PairStatus::Ended
                    && pair.ended_at.map(|at| at < cutoff).unwrap_or(false)
            })
            .map(|pair| pair.id)
            .collect();

        for pair_id in &doomed {
            table.pairs.remove(pair_id);
        }
        Ok(doomed.len())
    }
}
