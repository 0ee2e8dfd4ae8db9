//! Shared fixtures for integration tests

use async_trait::async_trait;
use rendezvous::config::AppConfig;
use rendezvous::error::{MatchingError, Result};
use rendezvous::lock::InMemoryLockManager;
use rendezvous::matching::ScoredMatcher;
use rendezvous::metrics::MetricsCollector;
use rendezvous::notify::MockNotifier;
use rendezvous::pair::{EndOutcome, InMemoryPairStore, PairStore};
use rendezvous::pairing::PairingManager;
use rendezvous::profile::StaticProfileProvider;
use rendezvous::queue::{InMemoryPendingQueue, PendingQueueStore};
use rendezvous::types::{
    EndReason, Gender, Pair, PairId, Preference, UserId, UserMatchProfile,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A fully wired in-memory system with handles to every component
pub struct TestSystem {
    pub manager: Arc<PairingManager>,
    pub queue: Arc<InMemoryPendingQueue>,
    pub pairs: Arc<dyn PairStore>,
    pub profiles: Arc<StaticProfileProvider>,
    pub notifier: Arc<MockNotifier>,
}

/// Build a system with the default in-memory pair store
pub fn build_system(config: AppConfig) -> TestSystem {
    build_system_with_pairs(config, Arc::new(InMemoryPairStore::new()))
}

/// Build a system around a caller-provided pair store
pub fn build_system_with_pairs(config: AppConfig, pairs: Arc<dyn PairStore>) -> TestSystem {
    let queue = Arc::new(InMemoryPendingQueue::new());
    let profiles = Arc::new(StaticProfileProvider::new());
    let notifier = Arc::new(MockNotifier::new());

    let manager = Arc::new(PairingManager::with_matcher_and_metrics(
        Arc::new(InMemoryLockManager::new()),
        queue.clone(),
        pairs.clone(),
        profiles.clone(),
        notifier.clone(),
        Arc::new(ScoredMatcher::default()),
        Arc::new(MetricsCollector::new().expect("metrics collector")),
        config,
    ));

    TestSystem {
        manager,
        queue,
        pairs,
        profiles,
        notifier,
    }
}

/// Minimal profile with the given matching attributes
pub fn profile(user_id: UserId, gender: Gender, preference: Preference) -> UserMatchProfile {
    UserMatchProfile {
        user_id,
        gender,
        preference,
        age: None,
        location: None,
        search_radius_km: None,
        banned: false,
        soft_banned_until: None,
        premium: false,
        activity_score: 0.5,
        rating: None,
        recent_pair_count: 0,
    }
}

/// Pair store that fails `create_active` a configured number of times before
/// delegating, used to exercise the compensating re-enqueue path
pub struct FailingPairStore {
    inner: InMemoryPairStore,
    failures_remaining: AtomicUsize,
}

impl FailingPairStore {
    pub fn failing_times(failures: usize) -> Self {
        Self {
            inner: InMemoryPairStore::new(),
            failures_remaining: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl PairStore for FailingPairStore {
    async fn create_active(&self, user_id: UserId, partner_id: UserId) -> Result<Pair> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(MatchingError::StoreUnavailable {
                message: "injected pair store outage".to_string(),
            }
            .into());
        }
        self.inner.create_active(user_id, partner_id).await
    }

    async fn get(&self, pair_id: PairId) -> Result<Option<Pair>> {
        self.inner.get(pair_id).await
    }

    async fn find_active_by_user(&self, user_id: UserId) -> Result<Option<Pair>> {
        self.inner.find_active_by_user(user_id).await
    }

    async fn end(
        &self,
        pair_id: PairId,
        ended_by: Option<UserId>,
        reason: EndReason,
    ) -> Result<EndOutcome> {
        self.inner.end(pair_id, ended_by, reason).await
    }

    async fn find_stale_active(&self, inactive: chrono::Duration) -> Result<Vec<Pair>> {
        self.inner.find_stale_active(inactive).await
    }

    async fn find_expired_active(&self, max_duration: chrono::Duration) -> Result<Vec<Pair>> {
        self.inner.find_expired_active(max_duration).await
    }

    async fn record_message(&self, pair_id: PairId) -> Result<()> {
        self.inner.record_message(pair_id).await
    }

    async fn rate(&self, pair_id: PairId, rater: UserId, score: u8) -> Result<()> {
        self.inner.rate(pair_id, rater, score).await
    }

    async fn recent_partners(
        &self,
        user_id: UserId,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<UserId>> {
        self.inner.recent_partners(user_id, since).await
    }

    async fn purge_ended_before(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<usize> {
        self.inner.purge_ended_before(cutoff).await
    }
}

/// Assert the core mutual-exclusion invariant for a user: never both a queue
/// entry and an active pair at once
pub async fn assert_user_invariant(system: &TestSystem, user_id: UserId) {
    let waiting = system
        .queue
        .get(user_id)
        .await
        .expect("queue read")
        .is_some();
    let paired = system
        .pairs
        .find_active_by_user(user_id)
        .await
        .expect("pair read")
        .is_some();

    assert!(
        !(waiting && paired),
        "user {} is both waiting and actively paired",
        user_id
    );
}
