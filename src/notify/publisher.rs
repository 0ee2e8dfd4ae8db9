//! Notifier trait for informing users about matchmaking events
//!
//! The core is transport-agnostic: it emits typed events and an external
//! messaging layer delivers them. Delivery failures are the transport's
//! problem; the matching state is never rolled back for a failed notify.

use crate::error::Result;
use crate::types::{
    MatchCreated, NotificationEvent, PairEnded, QueuedForMatch, SearchExpired, SearchLocked,
    UserId,
};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use tracing::info;

/// Trait for publishing matchmaking events to users
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tell a participant their conversation has started
    async fn notify_match_created(&self, event: MatchCreated) -> Result<()>;

    /// Tell a user they were placed into the waiting queue
    async fn notify_queued(&self, event: QueuedForMatch) -> Result<()>;

    /// Tell a participant their conversation has ended
    async fn notify_pair_ended(&self, event: PairEnded) -> Result<()>;

    /// Tell a user their request was refused because an operation is in flight
    async fn notify_search_locked(&self, user_id: UserId) -> Result<()>;

    /// Tell a user their queue entry was purged without a match
    async fn notify_search_expired(&self, user_id: UserId) -> Result<()>;
}

/// Notifier that only logs, used when no transport is wired up
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_match_created(&self, event: MatchCreated) -> Result<()> {
        info!(
            "Match created - pair: {}, user: {}, partner: {}",
            event.pair_id, event.user_id, event.partner_id
        );
        Ok(())
    }

    async fn notify_queued(&self, event: QueuedForMatch) -> Result<()> {
        info!(
            "User {} queued - position: {}/{}, overcrowded: {}",
            event.user_id, event.position, event.total_waiting, event.is_overcrowded
        );
        Ok(())
    }

    async fn notify_pair_ended(&self, event: PairEnded) -> Result<()> {
        info!(
            "Pair {} ended for user {} - reason: {}",
            event.pair_id, event.user_id, event.reason
        );
        Ok(())
    }

    async fn notify_search_locked(&self, user_id: UserId) -> Result<()> {
        info!("User {} refused: operation already in flight", user_id);
        Ok(())
    }

    async fn notify_search_expired(&self, user_id: UserId) -> Result<()> {
        info!("User {} queue entry expired without a match", user_id);
        Ok(())
    }
}

/// Mock notifier for testing
#[derive(Debug, Default)]
pub struct MockNotifier {
    events: std::sync::Mutex<Vec<NotificationEvent>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events (for testing)
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of recorded events of a given type name (for testing)
    pub fn count_of(&self, kind: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| {
                matches!(
                    (kind, event),
                    ("MatchCreated", NotificationEvent::MatchCreated(_))
                        | ("QueuedForMatch", NotificationEvent::QueuedForMatch(_))
                        | ("PairEnded", NotificationEvent::PairEnded(_))
                        | ("SearchLocked", NotificationEvent::SearchLocked(_))
                        | ("SearchExpired", NotificationEvent::SearchExpired(_))
                )
            })
            .count()
    }

    /// Clear recorded events (for testing)
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    fn record(&self, event: NotificationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify_match_created(&self, event: MatchCreated) -> Result<()> {
        self.record(NotificationEvent::MatchCreated(event));
        Ok(())
    }

    async fn notify_queued(&self, event: QueuedForMatch) -> Result<()> {
        self.record(NotificationEvent::QueuedForMatch(event));
        Ok(())
    }

    async fn notify_pair_ended(&self, event: PairEnded) -> Result<()> {
        self.record(NotificationEvent::PairEnded(event));
        Ok(())
    }

    async fn notify_search_locked(&self, user_id: UserId) -> Result<()> {
        self.record(NotificationEvent::SearchLocked(SearchLocked {
            user_id,
            timestamp: current_timestamp(),
        }));
        Ok(())
    }

    async fn notify_search_expired(&self, user_id: UserId) -> Result<()> {
        self.record(NotificationEvent::SearchExpired(SearchExpired {
            user_id,
            timestamp: current_timestamp(),
        }));
        Ok(())
    }
}
