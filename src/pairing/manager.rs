//! Pairing manager implementation
//!
//! This module provides the core PairingManager that orchestrates search
//! requests, candidate claiming, pair lifecycle, and the periodic cleanup
//! sweep. All state-mutating flows run under the per-user, per-operation
//! locks; read-only queries are lock-free.

use crate::config::AppConfig;
use crate::error::{MatchingError, Result};
use crate::lock::{search_lock_key, stop_lock_key, LockManager, LockToken};
use crate::matching::{Candidate, CandidateMatcher, MatchContext, ScoredMatcher};
use crate::metrics::MetricsCollector;
use crate::notify::Notifier;
use crate::pair::{EndOutcome, PairStore};
use crate::profile::ProfileProvider;
use crate::queue::{HealthThresholds, PendingQueueStore, QueueHealthMonitor};
use crate::types::{
    EndReason, MatchCreated, Pair, PairEnded, PendingEntry, Preference, QueuedForMatch, UserId,
    UserMatchProfile,
};
use crate::utils::current_timestamp;
use chrono::Duration as ChronoDuration;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Result of a start-search request
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// A partner was found and a conversation created
    Matched(Pair),
    /// No partner available; the requester now waits in the queue
    Enqueued {
        position: usize,
        total_waiting: usize,
    },
    /// The requester already has an active conversation
    AlreadyPaired(Pair),
    /// The requester is already waiting in the queue
    AlreadySearching { position: usize },
}

impl StartOutcome {
    /// Outcome label used in metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            StartOutcome::Matched(_) => "matched",
            StartOutcome::Enqueued { .. } => "enqueued",
            StartOutcome::AlreadyPaired(_) => "already_paired",
            StartOutcome::AlreadySearching { .. } => "already_searching",
        }
    }
}

/// Result of a stop-search request
#[derive(Debug, Clone)]
pub enum StopOutcome {
    /// The requester's queue entry was removed
    StoppedSearching,
    /// The requester's active conversation was ended
    EndedPair(Pair),
    /// Neither a queue entry nor an active conversation existed
    NothingToStop,
}

/// Lock-free queue status for a user
#[derive(Debug, Clone)]
pub struct QueueStatus {
    /// FIFO rank, `None` when the user is not waiting
    pub position: Option<usize>,
    pub total_waiting: usize,
    pub is_overcrowded: bool,
}

/// Results of one cleanup sweep
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub pairs_ended: usize,
    pub entries_purged: usize,
    pub pairs_purged: usize,
}

/// Statistics about pairing operations
#[derive(Debug, Clone, Default)]
pub struct PairingStats {
    /// Total search requests processed
    pub searches: u64,
    /// Conversations created
    pub matches_made: u64,
    /// Requests that ended up waiting in the queue
    pub enqueued: u64,
    /// Conversations ended (user stops, next requests, and sweeps)
    pub pairs_ended: u64,
    /// Cleanup sweeps run
    pub sweeps_run: u64,
    /// Queue entries purged by sweeps
    pub entries_purged: u64,
}

/// The main pairing manager
#[derive(Clone)]
pub struct PairingManager {
    /// Per-user, per-operation mutual exclusion
    locks: Arc<dyn LockManager>,
    /// FIFO waiting list
    queue: Arc<dyn PendingQueueStore>,
    /// Conversation records
    pairs: Arc<dyn PairStore>,
    /// Read-only profile bridge
    profiles: Arc<dyn ProfileProvider>,
    /// Outbound event sink
    notifier: Arc<dyn Notifier>,
    /// Candidate selection
    matcher: Arc<dyn CandidateMatcher>,
    /// Queue health signals
    health: QueueHealthMonitor,
    /// Application configuration
    config: AppConfig,
    /// Manager statistics
    stats: Arc<RwLock<PairingStats>>,
    /// Metrics collector for recording performance data
    metrics: Arc<MetricsCollector>,
}

impl PairingManager {
    /// Create a new pairing manager with the default matcher and metrics
    pub fn new(
        locks: Arc<dyn LockManager>,
        queue: Arc<dyn PendingQueueStore>,
        pairs: Arc<dyn PairStore>,
        profiles: Arc<dyn ProfileProvider>,
        notifier: Arc<dyn Notifier>,
        config: AppConfig,
    ) -> Self {
        Self::with_matcher_and_metrics(
            locks,
            queue,
            pairs,
            profiles,
            notifier,
            Arc::new(ScoredMatcher::default()),
            Arc::new(MetricsCollector::default()),
            config,
        )
    }

    /// Create with a custom matcher and metrics collector
    #[allow(clippy::too_many_arguments)]
    pub fn with_matcher_and_metrics(
        locks: Arc<dyn LockManager>,
        queue: Arc<dyn PendingQueueStore>,
        pairs: Arc<dyn PairStore>,
        profiles: Arc<dyn ProfileProvider>,
        notifier: Arc<dyn Notifier>,
        matcher: Arc<dyn CandidateMatcher>,
        metrics: Arc<MetricsCollector>,
        config: AppConfig,
    ) -> Self {
        let health = QueueHealthMonitor::new(
            queue.clone(),
            HealthThresholds {
                overcrowd_threshold: config.matching.overcrowd_threshold,
                min_minority_ratio: config.matching.min_minority_ratio,
            },
        );

        Self {
            locks,
            queue,
            pairs,
            profiles,
            notifier,
            matcher,
            health,
            config,
            stats: Arc::new(RwLock::new(PairingStats::default())),
            metrics,
        }
    }

    /// Queue health monitor (read-only)
    pub fn health(&self) -> &QueueHealthMonitor {
        &self.health
    }

    /// Handle a start-search request for a user
    pub async fn start_search(&self, user_id: UserId) -> Result<StartOutcome> {
        let timer = self.metrics.start_timer();
        let token = self.acquire_or_report(&search_lock_key(user_id), user_id).await?;

        self.bump_stats(|stats| stats.searches += 1);

        let result = self.start_search_locked(user_id).await;
        self.release_quietly(&search_lock_key(user_id), &token).await;

        let duration = timer.stop();
        match &result {
            Ok(outcome) => {
                info!(
                    "Search completed - user: {}, outcome: {}, duration: {:.2}ms",
                    user_id,
                    outcome.label(),
                    duration.as_secs_f64() * 1000.0
                );
                self.metrics.record_search(outcome.label(), duration);
            }
            Err(e) => {
                warn!("Search failed - user: {}, error: {}", user_id, e);
                self.metrics.record_search("error", duration);
            }
        }

        result
    }

    /// The search critical section, entered with the user's lock held
    async fn start_search_locked(&self, user_id: UserId) -> Result<StartOutcome> {
        let profile = self.profiles.get_profile(user_id).await?;
        let now = current_timestamp();

        if profile.banned {
            return Err(MatchingError::UserNotEligible {
                user_id,
                reason: "banned".to_string(),
            }
            .into());
        }
        if profile.is_soft_banned_at(now) {
            return Err(MatchingError::UserNotEligible {
                user_id,
                reason: "soft ban in effect".to_string(),
            }
            .into());
        }

        // An active conversation wins over a new search
        if let Some(pair) = self.pairs.find_active_by_user(user_id).await? {
            debug!("User {} already paired in {}", user_id, pair.id);
            return Ok(StartOutcome::AlreadyPaired(pair));
        }

        // A live queue entry means the previous search is still on
        if self.queue.get(user_id).await?.is_some() {
            let position = self.queue.position_of(user_id).await?.unwrap_or(0);
            debug!("User {} already searching at position {}", user_id, position);
            return Ok(StartOutcome::AlreadySearching { position });
        }

        if let Some(pair) = self.try_match(&profile).await? {
            self.bump_stats(|stats| stats.matches_made += 1);
            return Ok(StartOutcome::Matched(pair));
        }

        self.enqueue_requester(&profile).await
    }

    /// Find, claim, and pair with the best waiting candidate.
    ///
    /// Claiming is the store's atomic remove: of two searchers racing for the
    /// same candidate exactly one sees the entry, the other falls through to
    /// its next choice. Any failure after a successful claim re-inserts the
    /// claimed entry with its original timestamp before the error surfaces.
    async fn try_match(&self, requester: &UserMatchProfile) -> Result<Option<Pair>> {
        let sample = self
            .queue
            .oldest(self.config.matching.candidate_sample_size)
            .await?;
        if sample.is_empty() {
            return Ok(None);
        }

        let now = current_timestamp();
        let recent: HashSet<UserId> = self
            .pairs
            .recent_partners(requester.user_id, now - self.config.recent_partner_cooldown())
            .await?
            .into_iter()
            .collect();
        let ctx = MatchContext::new(self.config.matching.policy, now).with_recent_partners(recent);

        let mut candidates = Vec::with_capacity(sample.len());
        for entry in sample {
            if entry.user_id == requester.user_id {
                continue;
            }
            match self.profiles.get_profile(entry.user_id).await {
                Ok(profile) => candidates.push(Candidate { entry, profile }),
                Err(e) => warn!("Skipping candidate {} without profile: {}", entry.user_id, e),
            }
        }

        while let Some(idx) = self
            .matcher
            .select_candidate(requester, &candidates, &ctx)
        {
            let candidate = candidates.remove(idx);

            let Some(claimed) = self.queue.remove(candidate.entry.user_id).await? else {
                debug!(
                    "Candidate {} claimed by a concurrent searcher, trying next",
                    candidate.entry.user_id
                );
                continue;
            };

            match self
                .pairs
                .create_active(requester.user_id, claimed.user_id)
                .await
            {
                Ok(pair) => {
                    let wait = (now - claimed.enqueued_at).to_std().unwrap_or_default();
                    self.metrics.record_pair_created(wait);

                    self.set_searching_quietly(requester.user_id, false).await;
                    self.set_searching_quietly(claimed.user_id, false).await;
                    self.update_queue_gauges().await;

                    info!(
                        "Matched users {} and {} into pair {} after {:.0}s wait",
                        requester.user_id,
                        claimed.user_id,
                        pair.id,
                        wait.as_secs_f64()
                    );

                    for (recipient, partner) in [
                        (pair.user_id, pair.partner_id),
                        (pair.partner_id, pair.user_id),
                    ] {
                        let event = MatchCreated {
                            pair_id: pair.id,
                            user_id: recipient,
                            partner_id: partner,
                            timestamp: now,
                        };
                        if let Err(e) = self.notifier.notify_match_created(event).await {
                            warn!("Failed to notify user {} of match: {}", recipient, e);
                        }
                    }

                    return Ok(Some(pair));
                }
                Err(e) => {
                    // A candidate who started their own search can win a pair
                    // between our claim and the pair write. Their entry is
                    // correctly gone; treat it like losing the claim race.
                    if let Some(MatchingError::AlreadyPaired { user_id }) =
                        e.downcast_ref::<MatchingError>()
                    {
                        if *user_id == claimed.user_id {
                            debug!(
                                "Candidate {} got paired concurrently, trying next",
                                claimed.user_id
                            );
                            continue;
                        }
                    }

                    // The candidate is out of the queue but has no pair; put
                    // them back before surfacing the failure.
                    warn!(
                        "Pair creation failed after claiming candidate {}: {}; re-enqueueing",
                        claimed.user_id, e
                    );
                    if let Err(re) = self.queue.enqueue(claimed.clone()).await {
                        error!(
                            "Failed to re-enqueue candidate {} after failed pair creation: {}",
                            claimed.user_id, re
                        );
                    }
                    return Err(MatchingError::InconsistentRemoval {
                        user_id: claimed.user_id,
                    }
                    .into());
                }
            }
        }

        Ok(None)
    }

    /// Put the requester into the waiting queue and report their position
    async fn enqueue_requester(&self, profile: &UserMatchProfile) -> Result<StartOutcome> {
        let now = current_timestamp();
        let entry = PendingEntry {
            user_id: profile.user_id,
            gender: profile.gender,
            preference: profile.preference,
            enqueued_at: now,
        };

        self.queue.enqueue(entry).await?;
        self.set_searching_quietly(profile.user_id, true).await;
        self.bump_stats(|stats| stats.enqueued += 1);

        let total_waiting = self.queue.count().await?;
        let position = self
            .queue
            .position_of(profile.user_id)
            .await?
            .unwrap_or(total_waiting);
        let is_overcrowded = self.health.is_overcrowded_now().await?;
        let underrepresented_gender = self.health.underrepresented_gender().await?;
        self.update_queue_gauges().await;

        info!(
            "User {} enqueued at position {}/{} (overcrowded: {})",
            profile.user_id, position, total_waiting, is_overcrowded
        );

        let event = QueuedForMatch {
            user_id: profile.user_id,
            position,
            total_waiting,
            is_overcrowded,
            underrepresented_gender,
            timestamp: now,
        };
        if let Err(e) = self.notifier.notify_queued(event).await {
            warn!("Failed to notify user {} of queueing: {}", profile.user_id, e);
        }

        Ok(StartOutcome::Enqueued {
            position,
            total_waiting,
        })
    }

    /// Handle a stop-search request for a user
    pub async fn stop_search(&self, user_id: UserId) -> Result<StopOutcome> {
        let token = self.acquire_or_report(&stop_lock_key(user_id), user_id).await?;
        let result = self.stop_search_locked(user_id, EndReason::UserStop).await;
        self.release_quietly(&stop_lock_key(user_id), &token).await;
        result
    }

    /// The stop critical section, entered with the user's stop lock held
    async fn stop_search_locked(
        &self,
        user_id: UserId,
        reason: EndReason,
    ) -> Result<StopOutcome> {
        if self.queue.remove(user_id).await?.is_some() {
            self.set_searching_quietly(user_id, false).await;
            self.update_queue_gauges().await;
            info!("User {} left the waiting queue", user_id);
            return Ok(StopOutcome::StoppedSearching);
        }

        if let Some(pair) = self.pairs.find_active_by_user(user_id).await? {
            return match self.pairs.end(pair.id, Some(user_id), reason).await? {
                EndOutcome::Ended(ended) => {
                    self.bump_stats(|stats| stats.pairs_ended += 1);
                    self.report_pair_ended(&ended).await;
                    Ok(StopOutcome::EndedPair(ended))
                }
                EndOutcome::AlreadyEnded(_) => {
                    debug!("Pair {} was already ended", pair.id);
                    Ok(StopOutcome::NothingToStop)
                }
            };
        }

        debug!("User {} had nothing to stop", user_id);
        Ok(StopOutcome::NothingToStop)
    }

    /// Stop any current activity, then immediately search again
    pub async fn next_search(&self, user_id: UserId) -> Result<StartOutcome> {
        let token = self.acquire_or_report(&stop_lock_key(user_id), user_id).await?;
        let stopped = self
            .stop_search_locked(user_id, EndReason::NextRequested)
            .await;
        self.release_quietly(&stop_lock_key(user_id), &token).await;
        stopped?;

        self.start_search(user_id).await
    }

    /// Lock-free queue status for a user
    pub async fn queue_status(&self, user_id: UserId) -> Result<QueueStatus> {
        Ok(QueueStatus {
            position: self.queue.position_of(user_id).await?,
            total_waiting: self.queue.count().await?,
            is_overcrowded: self.health.is_overcrowded_now().await?,
        })
    }

    /// Widen a waiting user's preference to any gender, in place.
    ///
    /// Returns false when the user is not waiting. Forward-looking only:
    /// the change applies from the next dequeue attempt.
    pub async fn switch_to_random(&self, user_id: UserId) -> Result<bool> {
        let switched = self.queue.set_preference(user_id, Preference::Any).await?;
        if switched {
            info!("User {} switched to random matching", user_id);
        }
        Ok(switched)
    }

    /// Record one message on an active pair
    pub async fn record_message(&self, pair_id: crate::types::PairId) -> Result<()> {
        self.pairs.record_message(pair_id).await
    }

    /// Record a participant's 1-5 rating of a conversation
    pub async fn rate_pair(
        &self,
        pair_id: crate::types::PairId,
        rater: UserId,
        score: u8,
    ) -> Result<()> {
        self.pairs.rate(pair_id, rater, score).await
    }

    /// End stale and over-long conversations and purge abandoned queue
    /// entries.
    ///
    /// Idempotent: ending an already-ended pair is a safe no-op, so the sweep
    /// needs no per-user locks.
    pub async fn run_cleanup_sweep(
        &self,
        inactive: ChronoDuration,
        max_duration: ChronoDuration,
        pending_stale: ChronoDuration,
    ) -> Result<CleanupReport> {
        let now = current_timestamp();
        let mut report = CleanupReport::default();

        let mut doomed: HashMap<crate::types::PairId, Pair> = HashMap::new();
        for pair in self.pairs.find_stale_active(inactive).await? {
            doomed.insert(pair.id, pair);
        }
        for pair in self.pairs.find_expired_active(max_duration).await? {
            doomed.insert(pair.id, pair);
        }

        for (pair_id, _) in doomed {
            match self.pairs.end(pair_id, None, EndReason::AutoEnded).await {
                Ok(EndOutcome::Ended(ended)) => {
                    report.pairs_ended += 1;
                    self.report_pair_ended(&ended).await;
                }
                Ok(EndOutcome::AlreadyEnded(_)) => {
                    debug!("Sweep skipped already-ended pair {}", pair_id);
                }
                Err(e) => {
                    warn!("Sweep failed to end pair {}: {}", pair_id, e);
                }
            }
        }

        let purged = self.queue.purge_older_than(now - pending_stale).await?;
        report.entries_purged = purged.len();
        for entry in &purged {
            self.set_searching_quietly(entry.user_id, false).await;
            if let Err(e) = self.notifier.notify_search_expired(entry.user_id).await {
                warn!(
                    "Failed to notify user {} of expired search: {}",
                    entry.user_id, e
                );
            }
        }

        report.pairs_purged = self
            .pairs
            .purge_ended_before(now - self.config.ended_retention())
            .await?;

        self.metrics.record_sweep(report.entries_purged, report.pairs_purged);
        self.update_queue_gauges().await;
        self.bump_stats(|stats| {
            stats.sweeps_run += 1;
            stats.pairs_ended += report.pairs_ended as u64;
            stats.entries_purged += report.entries_purged as u64;
        });

        if report.pairs_ended > 0 || report.entries_purged > 0 || report.pairs_purged > 0 {
            info!(
                "Cleanup sweep: {} pairs ended, {} entries purged, {} ended pairs deleted",
                report.pairs_ended, report.entries_purged, report.pairs_purged
            );
        }

        Ok(report)
    }

    /// Start the periodic cleanup task
    pub fn start_cleanup_task(self: Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(&self);
        let period = manager.config.cleanup_interval();

        info!(
            "Starting cleanup task with {}s interval",
            period.as_secs()
        );

        tokio::spawn(async move {
            let mut cleanup_interval = interval(period);

            loop {
                cleanup_interval.tick().await;

                let result = manager
                    .run_cleanup_sweep(
                        manager.config.pair_inactive(),
                        manager.config.pair_max_duration(),
                        manager.config.pending_stale(),
                    )
                    .await;

                if let Err(e) = result {
                    error!("Error during cleanup sweep: {}", e);
                }
            }
        })
    }

    /// Get current manager statistics
    pub fn get_stats(&self) -> Result<PairingStats> {
        let stats = self.stats.read().map_err(|_| MatchingError::InternalError {
            message: "Failed to acquire stats lock".to_string(),
        })?;
        Ok(stats.clone())
    }

    /// Acquire a lock or translate contention into the reported refusal
    async fn acquire_or_report(&self, key: &str, user_id: UserId) -> Result<LockToken> {
        match self.locks.acquire(key, self.config.lock_ttl()).await {
            Ok(token) => Ok(token),
            Err(e) => {
                if matches!(
                    e.downcast_ref::<MatchingError>(),
                    Some(MatchingError::LockBusy { .. })
                ) {
                    self.metrics.record_lock_contention();
                    if let Err(ne) = self.notifier.notify_search_locked(user_id).await {
                        warn!("Failed to notify user {} of contention: {}", user_id, ne);
                    }
                }
                Err(e)
            }
        }
    }

    /// Release a lock, logging instead of failing the already-finished flow
    async fn release_quietly(&self, key: &str, token: &LockToken) {
        if let Err(e) = self.locks.release(key, token).await {
            warn!("Failed to release lock {}: {}", key, e);
        }
    }

    /// Notify both participants and record metrics for an ended pair
    async fn report_pair_ended(&self, ended: &Pair) {
        let reason = ended.end_reason.unwrap_or(EndReason::AutoEnded);
        let lifetime = ended
            .ended_at
            .map(|at| (at - ended.started_at).to_std().unwrap_or_default())
            .unwrap_or_default();
        self.metrics.record_pair_ended(reason, lifetime);

        info!(
            "Pair {} ended - reason: {}, lifetime: {:.0}s",
            ended.id,
            reason,
            lifetime.as_secs_f64()
        );

        for (recipient, partner) in [
            (ended.user_id, ended.partner_id),
            (ended.partner_id, ended.user_id),
        ] {
            let event = PairEnded {
                pair_id: ended.id,
                user_id: recipient,
                partner_id: partner,
                ended_by: ended.ended_by,
                reason,
                timestamp: ended.ended_at.unwrap_or_else(current_timestamp),
            };
            if let Err(e) = self.notifier.notify_pair_ended(event).await {
                warn!("Failed to notify user {} of pair end: {}", recipient, e);
            }
        }
    }

    /// Mirror the searching flag, logging failures instead of propagating
    async fn set_searching_quietly(&self, user_id: UserId, searching: bool) {
        if let Err(e) = self.profiles.set_searching(user_id, searching).await {
            warn!(
                "Failed to set searching={} for user {}: {}",
                searching, user_id, e
            );
        }
    }

    /// Refresh queue depth gauges from the store
    async fn update_queue_gauges(&self) {
        if let Ok(counts) = self.queue.gender_counts().await {
            self.metrics.update_queue_depth(counts.male, counts.female);
        }
    }

    fn bump_stats<F: FnOnce(&mut PairingStats)>(&self, update: F) {
        match self.stats.write() {
            Ok(mut stats) => update(&mut stats),
            Err(_) => warn!("Failed to acquire stats lock, dropping stats update"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::InMemoryLockManager;
    use crate::notify::MockNotifier;
    use crate::pair::InMemoryPairStore;
    use crate::profile::StaticProfileProvider;
    use crate::queue::InMemoryPendingQueue;
    use crate::types::{Gender, MatchPolicy, PairStatus};
    use std::time::Duration;

    struct TestHarness {
        manager: PairingManager,
        profiles: Arc<StaticProfileProvider>,
        notifier: Arc<MockNotifier>,
        locks: Arc<InMemoryLockManager>,
    }

    fn harness_with_config(config: AppConfig) -> TestHarness {
        let locks = Arc::new(InMemoryLockManager::new());
        let profiles = Arc::new(StaticProfileProvider::new());
        let notifier = Arc::new(MockNotifier::new());

        let manager = PairingManager::new(
            locks.clone(),
            Arc::new(InMemoryPendingQueue::new()),
            Arc::new(InMemoryPairStore::new()),
            profiles.clone(),
            notifier.clone(),
            config,
        );

        TestHarness {
            manager,
            profiles,
            notifier,
            locks,
        }
    }

    fn harness() -> TestHarness {
        harness_with_config(AppConfig::default())
    }

    fn profile(user_id: UserId, gender: Gender, preference: Preference) -> UserMatchProfile {
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

    #[tokio::test]
    async fn test_first_searcher_is_enqueued() {
        let h = harness();
        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Female));

        let outcome = h.manager.start_search(1).await.unwrap();
        match outcome {
            StartOutcome::Enqueued {
                position,
                total_waiting,
            } => {
                assert_eq!(position, 1);
                assert_eq!(total_waiting, 1);
            }
            other => panic!("Expected enqueue, got {:?}", other),
        }

        assert!(h.profiles.is_searching(1));
        assert_eq!(h.notifier.count_of("QueuedForMatch"), 1);
    }

    #[tokio::test]
    async fn test_compatible_searchers_are_matched() {
        let h = harness();
        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Female));
        h.profiles.upsert_profile(profile(2, Gender::Female, Preference::Male));

        h.manager.start_search(1).await.unwrap();
        let outcome = h.manager.start_search(2).await.unwrap();

        let pair = match outcome {
            StartOutcome::Matched(pair) => pair,
            other => panic!("Expected match, got {:?}", other),
        };
        assert_eq!(pair.status, PairStatus::Active);
        assert!(pair.involves(1) && pair.involves(2));

        // Both participants notified, both flags cleared, queue drained
        assert_eq!(h.notifier.count_of("MatchCreated"), 2);
        assert!(!h.profiles.is_searching(1));
        assert!(!h.profiles.is_searching(2));
        assert_eq!(h.manager.queue_status(1).await.unwrap().total_waiting, 0);

        let stats = h.manager.get_stats().unwrap();
        assert_eq!(stats.matches_made, 1);
        assert_eq!(stats.searches, 2);
    }

    #[tokio::test]
    async fn test_repeat_search_reports_already_searching() {
        let h = harness();
        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Female));

        h.manager.start_search(1).await.unwrap();
        let outcome = h.manager.start_search(1).await.unwrap();
        assert!(matches!(
            outcome,
            StartOutcome::AlreadySearching { position: 1 }
        ));
    }

    #[tokio::test]
    async fn test_search_while_paired_reports_already_paired() {
        let h = harness();
        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Any));
        h.profiles.upsert_profile(profile(2, Gender::Female, Preference::Any));

        h.manager.start_search(1).await.unwrap();
        h.manager.start_search(2).await.unwrap();

        let outcome = h.manager.start_search(1).await.unwrap();
        assert!(matches!(outcome, StartOutcome::AlreadyPaired(_)));
    }

    #[tokio::test]
    async fn test_banned_requester_is_refused() {
        let h = harness();
        let mut banned = profile(1, Gender::Male, Preference::Any);
        banned.banned = true;
        h.profiles.upsert_profile(banned);

        let err = h.manager.start_search(1).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchingError>(),
            Some(MatchingError::UserNotEligible { .. })
        ));
    }

    #[tokio::test]
    async fn test_strict_policy_keeps_incompatible_users_apart() {
        let h = harness();
        // Male wanting male; waiting male wants female
        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Female));
        h.profiles.upsert_profile(profile(2, Gender::Male, Preference::Male));

        h.manager.start_search(1).await.unwrap();
        let outcome = h.manager.start_search(2).await.unwrap();
        assert!(matches!(outcome, StartOutcome::Enqueued { .. }));
        assert_eq!(h.manager.queue_status(2).await.unwrap().total_waiting, 2);
    }

    #[tokio::test]
    async fn test_random_policy_ignores_preferences() {
        let mut config = AppConfig::default();
        config.matching.policy = MatchPolicy::Random;
        let h = harness_with_config(config);

        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Female));
        h.profiles.upsert_profile(profile(2, Gender::Male, Preference::Male));

        h.manager.start_search(1).await.unwrap();
        let outcome = h.manager.start_search(2).await.unwrap();
        assert!(matches!(outcome, StartOutcome::Matched(_)));
    }

    #[tokio::test]
    async fn test_switch_to_random_widens_stored_preference() {
        let h = harness();
        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Male));
        h.profiles.upsert_profile(profile(2, Gender::Female, Preference::Any));

        h.manager.start_search(1).await.unwrap();

        // Female/any requester cannot match a male-wanting-male entry...
        let outcome = h.manager.start_search(2).await.unwrap();
        assert!(matches!(outcome, StartOutcome::Enqueued { .. }));
        h.manager.stop_search(2).await.unwrap();

        // ...until the waiting user widens their preference
        assert!(h.manager.switch_to_random(1).await.unwrap());
        let outcome = h.manager.start_search(2).await.unwrap();
        assert!(matches!(outcome, StartOutcome::Matched(_)));

        assert!(!h.manager.switch_to_random(99).await.unwrap());
    }

    #[tokio::test]
    async fn test_stop_search_removes_queue_entry() {
        let h = harness();
        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Any));

        h.manager.start_search(1).await.unwrap();
        let outcome = h.manager.stop_search(1).await.unwrap();
        assert!(matches!(outcome, StopOutcome::StoppedSearching));
        assert!(!h.profiles.is_searching(1));
        assert_eq!(h.manager.queue_status(1).await.unwrap().total_waiting, 0);

        let outcome = h.manager.stop_search(1).await.unwrap();
        assert!(matches!(outcome, StopOutcome::NothingToStop));
    }

    #[tokio::test]
    async fn test_stop_search_ends_active_pair() {
        let h = harness();
        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Any));
        h.profiles.upsert_profile(profile(2, Gender::Female, Preference::Any));

        h.manager.start_search(1).await.unwrap();
        h.manager.start_search(2).await.unwrap();
        h.notifier.clear();

        let outcome = h.manager.stop_search(1).await.unwrap();
        let ended = match outcome {
            StopOutcome::EndedPair(pair) => pair,
            other => panic!("Expected ended pair, got {:?}", other),
        };
        assert_eq!(ended.status, PairStatus::Ended);
        assert_eq!(ended.ended_by, Some(1));
        assert_eq!(ended.end_reason, Some(EndReason::UserStop));
        assert_eq!(h.notifier.count_of("PairEnded"), 2);
    }

    #[tokio::test]
    async fn test_next_search_recycles_the_conversation() {
        let h = harness();
        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Any));
        h.profiles.upsert_profile(profile(2, Gender::Female, Preference::Any));

        h.manager.start_search(1).await.unwrap();
        h.manager.start_search(2).await.unwrap();

        let outcome = h.manager.next_search(1).await.unwrap();
        // The only other user was just conversed with and sits inside the
        // cooldown, so user 1 goes back to waiting
        assert!(matches!(outcome, StartOutcome::Enqueued { .. }));

        // The old pair is gone and carries the next_requested reason
        let status = h.manager.queue_status(1).await.unwrap();
        assert_eq!(status.position, Some(1));
    }

    #[tokio::test]
    async fn test_lock_contention_is_reported() {
        let h = harness();
        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Any));

        // Hold the user's search lock externally
        let _held = h
            .locks
            .acquire(&search_lock_key(1), Duration::from_secs(30))
            .await
            .unwrap();

        let err = h.manager.start_search(1).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchingError>(),
            Some(MatchingError::LockBusy { .. })
        ));
        assert_eq!(h.notifier.count_of("SearchLocked"), 1);
    }

    #[tokio::test]
    async fn test_cleanup_sweep_ends_stale_pairs_and_purges_entries() {
        let h = harness();
        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Any));
        h.profiles.upsert_profile(profile(2, Gender::Female, Preference::Any));
        h.profiles.upsert_profile(profile(3, Gender::Male, Preference::Male));

        h.manager.start_search(1).await.unwrap();
        h.manager.start_search(2).await.unwrap();
        h.manager.start_search(3).await.unwrap();
        h.notifier.clear();

        // Zero thresholds make everything stale immediately
        let report = h
            .manager
            .run_cleanup_sweep(
                ChronoDuration::zero(),
                ChronoDuration::zero(),
                ChronoDuration::zero(),
            )
            .await
            .unwrap();

        assert_eq!(report.pairs_ended, 1);
        assert_eq!(report.entries_purged, 1);
        assert_eq!(h.notifier.count_of("PairEnded"), 2);
        assert_eq!(h.notifier.count_of("SearchExpired"), 1);
        assert!(!h.profiles.is_searching(3));

        // Idempotent: a second sweep finds nothing
        let report = h
            .manager
            .run_cleanup_sweep(
                ChronoDuration::zero(),
                ChronoDuration::zero(),
                ChronoDuration::zero(),
            )
            .await
            .unwrap();
        assert_eq!(report.pairs_ended, 0);
        assert_eq!(report.entries_purged, 0);
    }

    #[tokio::test]
    async fn test_cleanup_sweep_spares_fresh_state() {
        let h = harness();
        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Any));
        h.profiles.upsert_profile(profile(2, Gender::Female, Preference::Any));
        h.profiles.upsert_profile(profile(3, Gender::Male, Preference::Male));

        h.manager.start_search(1).await.unwrap();
        h.manager.start_search(2).await.unwrap();
        h.manager.start_search(3).await.unwrap();

        let report = h
            .manager
            .run_cleanup_sweep(
                ChronoDuration::minutes(30),
                ChronoDuration::hours(12),
                ChronoDuration::minutes(60),
            )
            .await
            .unwrap();

        assert_eq!(report.pairs_ended, 0);
        assert_eq!(report.entries_purged, 0);
        assert_eq!(h.manager.queue_status(3).await.unwrap().total_waiting, 1);
    }

    #[tokio::test]
    async fn test_record_message_and_rating_passthrough() {
        let h = harness();
        h.profiles.upsert_profile(profile(1, Gender::Male, Preference::Any));
        h.profiles.upsert_profile(profile(2, Gender::Female, Preference::Any));

        h.manager.start_search(1).await.unwrap();
        let pair = match h.manager.start_search(2).await.unwrap() {
            StartOutcome::Matched(pair) => pair,
            other => panic!("Expected match, got {:?}", other),
        };

        h.manager.record_message(pair.id).await.unwrap();
        h.manager.rate_pair(pair.id, 1, 5).await.unwrap();
        assert!(h.manager.rate_pair(pair.id, 1, 9).await.is_err());
    }
}
