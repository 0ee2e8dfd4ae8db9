//! Pending queue store trait and the in-memory implementation
//!
//! One row per waiting user. Enqueue is an upsert (a user changing their
//! preference while waiting never produces duplicate rows) and removal is a
//! single atomic compare-and-delete, which is what serializes two searchers
//! racing for the same candidate.

use crate::error::{MatchingError, Result};
use crate::types::{Gender, PendingEntry, Preference, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Waiting-user counts by gender
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenderCounts {
    pub male: usize,
    pub female: usize,
}

impl GenderCounts {
    pub fn total(&self) -> usize {
        self.male + self.female
    }
}

/// Trait for the FIFO waiting list of users seeking a partner
#[async_trait]
pub trait PendingQueueStore: Send + Sync {
    /// Insert or replace the entry for `entry.user_id`.
    ///
    /// The entry is stored as given; callers stamp `enqueued_at`, so a
    /// compensating re-insert preserves the original queue position.
    async fn enqueue(&self, entry: PendingEntry) -> Result<()>;

    /// Atomically remove and return the entry for `user_id`.
    ///
    /// Doubles as the claim operation during matching: of two concurrent
    /// searchers racing for the same candidate, exactly one observes `Some`.
    async fn remove(&self, user_id: UserId) -> Result<Option<PendingEntry>>;

    /// Current entry for `user_id`, if waiting
    async fn get(&self, user_id: UserId) -> Result<Option<PendingEntry>>;

    /// Number of waiting users
    async fn count(&self) -> Result<usize>;

    /// Waiting-user counts by gender
    async fn gender_counts(&self) -> Result<GenderCounts>;

    /// FIFO rank of `user_id`, starting at 1 for the oldest entry
    async fn position_of(&self, user_id: UserId) -> Result<Option<usize>>;

    /// Snapshot of the oldest `limit` entries, oldest first
    async fn oldest(&self, limit: usize) -> Result<Vec<PendingEntry>>;

    /// Mutate the stored preference in place, preserving queue position.
    ///
    /// Returns false when the user has no pending entry.
    async fn set_preference(&self, user_id: UserId, preference: Preference) -> Result<bool>;

    /// Remove and return all entries enqueued before `cutoff`
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<PendingEntry>>;
}

struct StoredEntry {
    entry: PendingEntry,
    /// Insertion sequence, tie-breaker for identical timestamps
    seq: u64,
}

/// In-memory pending queue backed by a `RwLock`-guarded map
#[derive(Default)]
pub struct InMemoryPendingQueue {
    entries: RwLock<HashMap<UserId, StoredEntry>>,
    next_seq: AtomicU64,
}

impl InMemoryPendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_entries(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<UserId, StoredEntry>>> {
        self.entries
            .read()
            .map_err(|_| {
                MatchingError::InternalError {
                    message: "Failed to acquire pending queue lock".to_string(),
                }
                .into()
            })
    }

    fn write_entries(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<UserId, StoredEntry>>> {
        self.entries
            .write()
            .map_err(|_| {
                MatchingError::InternalError {
                    message: "Failed to acquire pending queue lock".to_string(),
                }
                .into()
            })
    }

    /// All entries in FIFO order
    fn ordered(entries: &HashMap<UserId, StoredEntry>) -> Vec<&StoredEntry> {
        let mut all: Vec<&StoredEntry> = entries.values().collect();
        all.sort_by(|a, b| {
            a.entry
                .enqueued_at
                .cmp(&b.entry.enqueued_at)
                .then(a.seq.cmp(&b.seq))
        });
        all
    }
}

#[async_trait]
impl PendingQueueStore for InMemoryPendingQueue {
    async fn enqueue(&self, entry: PendingEntry) -> Result<()> {
        let mut entries = self.write_entries()?;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        entries.insert(entry.user_id, StoredEntry { entry, seq });
        Ok(())
    }

    async fn remove(&self, user_id: UserId) -> Result<Option<PendingEntry>> {
        let mut entries = self.write_entries()?;
        Ok(entries.remove(&user_id).map(|stored| stored.entry))
    }

    async fn get(&self, user_id: UserId) -> Result<Option<PendingEntry>> {
        let entries = self.read_entries()?;
        Ok(entries.get(&user_id).map(|stored| stored.entry.clone()))
    }

    async fn count(&self) -> Result<usize> {
        let entries = self.read_entries()?;
        Ok(entries.len())
    }

    async fn gender_counts(&self) -> Result<GenderCounts> {
        let entries = self.read_entries()?;
        let mut counts = GenderCounts::default();
        for stored in entries.values() {
            match stored.entry.gender {
                Gender::Male => counts.male += 1,
                Gender::Female => counts.female += 1,
            }
        }
        Ok(counts)
    }

    async fn position_of(&self, user_id: UserId) -> Result<Option<usize>> {
        let entries = self.read_entries()?;
        let position = Self::ordered(&entries)
            .iter()
            .position(|stored| stored.entry.user_id == user_id)
            .map(|idx| idx + 1);
        Ok(position)
    }

    async fn oldest(&self, limit: usize) -> Result<Vec<PendingEntry>> {
        let entries = self.read_entries()?;
        Ok(Self::ordered(&entries)
            .into_iter()
            .take(limit)
            .map(|stored| stored.entry.clone())
            .collect())
    }

    async fn set_preference(&self, user_id: UserId, preference: Preference) -> Result<bool> {
        let mut entries = self.write_entries()?;
        match entries.get_mut(&user_id) {
            Some(stored) => {
                stored.entry.preference = preference;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<PendingEntry>> {
        let mut entries = self.write_entries()?;
        let stale_ids: Vec<UserId> = entries
            .values()
            .filter(|stored| stored.entry.enqueued_at < cutoff)
            .map(|stored| stored.entry.user_id)
            .collect();

        let mut purged = Vec::with_capacity(stale_ids.len());
        for user_id in stale_ids {
            if let Some(stored) = entries.remove(&user_id) {
                purged.push(stored.entry);
            }
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::current_timestamp;
    use chrono::Duration;

    fn entry(user_id: UserId, gender: Gender, preference: Preference) -> PendingEntry {
        PendingEntry {
            user_id,
            gender,
            preference,
            enqueued_at: current_timestamp(),
        }
    }

    fn entry_at(
        user_id: UserId,
        gender: Gender,
        preference: Preference,
        enqueued_at: chrono::DateTime<Utc>,
    ) -> PendingEntry {
        PendingEntry {
            user_id,
            gender,
            preference,
            enqueued_at,
        }
    }

    #[tokio::test]
    async fn test_enqueue_is_upsert() {
        let queue = InMemoryPendingQueue::new();

        queue
            .enqueue(entry(1, Gender::Male, Preference::Female))
            .await
            .unwrap();
        queue
            .enqueue(entry(1, Gender::Male, Preference::Any))
            .await
            .unwrap();

        assert_eq!(queue.count().await.unwrap(), 1);
        let stored = queue.get(1).await.unwrap().unwrap();
        assert_eq!(stored.preference, Preference::Any);
    }

    #[tokio::test]
    async fn test_fifo_ordering_and_position() {
        let queue = InMemoryPendingQueue::new();
        let base = current_timestamp();

        queue
            .enqueue(entry_at(1, Gender::Male, Preference::Any, base))
            .await
            .unwrap();
        queue
            .enqueue(entry_at(
                2,
                Gender::Female,
                Preference::Any,
                base + Duration::seconds(1),
            ))
            .await
            .unwrap();
        queue
            .enqueue(entry_at(
                3,
                Gender::Male,
                Preference::Any,
                base + Duration::seconds(2),
            ))
            .await
            .unwrap();

        let oldest = queue.oldest(10).await.unwrap();
        let ids: Vec<UserId> = oldest.iter().map(|e| e.user_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        assert_eq!(queue.position_of(1).await.unwrap(), Some(1));
        assert_eq!(queue.position_of(3).await.unwrap(), Some(3));
        assert_eq!(queue.position_of(99).await.unwrap(), None);

        // Bounded snapshot
        assert_eq!(queue.oldest(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_insertion_order() {
        let queue = InMemoryPendingQueue::new();
        let at = current_timestamp();

        for id in [10, 11, 12] {
            queue
                .enqueue(entry_at(id, Gender::Male, Preference::Any, at))
                .await
                .unwrap();
        }

        let ids: Vec<UserId> = queue
            .oldest(10)
            .await
            .unwrap()
            .iter()
            .map(|e| e.user_id)
            .collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }

    #[tokio::test]
    async fn test_remove_claims_exactly_once() {
        let queue = InMemoryPendingQueue::new();
        queue
            .enqueue(entry(1, Gender::Female, Preference::Any))
            .await
            .unwrap();

        assert!(queue.remove(1).await.unwrap().is_some());
        assert!(queue.remove(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_gender_counts() {
        let queue = InMemoryPendingQueue::new();
        queue
            .enqueue(entry(1, Gender::Male, Preference::Any))
            .await
            .unwrap();
        queue
            .enqueue(entry(2, Gender::Female, Preference::Any))
            .await
            .unwrap();
        queue
            .enqueue(entry(3, Gender::Female, Preference::Male))
            .await
            .unwrap();

        let counts = queue.gender_counts().await.unwrap();
        assert_eq!(counts.male, 1);
        assert_eq!(counts.female, 2);
        assert_eq!(counts.total(), 3);
    }

    #[tokio::test]
    async fn test_set_preference_preserves_position() {
        let queue = InMemoryPendingQueue::new();
        let base = current_timestamp();

        queue
            .enqueue(entry_at(1, Gender::Male, Preference::Female, base))
            .await
            .unwrap();
        queue
            .enqueue(entry_at(
                2,
                Gender::Male,
                Preference::Female,
                base + Duration::seconds(1),
            ))
            .await
            .unwrap();

        assert!(queue.set_preference(1, Preference::Any).await.unwrap());
        assert_eq!(queue.position_of(1).await.unwrap(), Some(1));
        assert_eq!(
            queue.get(1).await.unwrap().unwrap().preference,
            Preference::Any
        );

        assert!(!queue.set_preference(99, Preference::Any).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_older_than() {
        let queue = InMemoryPendingQueue::new();
        let now = current_timestamp();

        queue
            .enqueue(entry_at(
                1,
                Gender::Male,
                Preference::Any,
                now - Duration::minutes(30),
            ))
            .await
            .unwrap();
        queue
            .enqueue(entry_at(2, Gender::Female, Preference::Any, now))
            .await
            .unwrap();

        let purged = queue
            .purge_older_than(now - Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].user_id, 1);
        assert_eq!(queue.count().await.unwrap(), 1);
    }
}
