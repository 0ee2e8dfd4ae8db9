//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the rendezvous matchmaking
//! service using Prometheus metrics.

use crate::types::EndReason;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Search-flow metrics
    search_metrics: SearchMetrics,

    /// Pending-queue metrics
    queue_metrics: QueueMetrics,

    /// Conversation-pair metrics
    pair_metrics: PairMetrics,
}

/// Search-flow metrics
#[derive(Clone)]
pub struct SearchMetrics {
    /// Search requests by outcome (matched, enqueued, already_paired, ...)
    pub searches_total: IntCounterVec,

    /// Search request processing time
    pub search_duration_seconds: Histogram,

    /// Requests refused because the per-user lock was held
    pub lock_contention_total: IntCounter,
}

/// Pending-queue metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Users currently waiting for a partner
    pub entries_waiting: IntGauge,

    /// Waiting users by gender
    pub entries_waiting_by_gender: IntGaugeVec,

    /// Time spent in the queue before a match
    pub queue_wait_seconds: Histogram,

    /// Queue entries purged by the cleanup sweep
    pub entries_purged_total: IntCounter,
}

/// Conversation-pair metrics
#[derive(Clone)]
pub struct PairMetrics {
    /// Total conversations created
    pub pairs_created_total: IntCounter,

    /// Conversations ended, by reason
    pub pairs_ended_total: IntCounterVec,

    /// Currently active conversations
    pub active_pairs: IntGauge,

    /// Conversation lifetime from start to end
    pub pair_duration_seconds: Histogram,

    /// Ended conversations removed by the retention job
    pub pairs_purged_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let search_metrics = SearchMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let pair_metrics = PairMetrics::new(&registry)?;

        Ok(Self {
            registry,
            search_metrics,
            queue_metrics,
            pair_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get search metrics
    pub fn search(&self) -> &SearchMetrics {
        &self.search_metrics
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get pair metrics
    pub fn pair(&self) -> &PairMetrics {
        &self.pair_metrics
    }

    /// Record a completed search request
    pub fn record_search(&self, outcome: &str, duration: Duration) {
        self.search_metrics
            .searches_total
            .with_label_values(&[outcome])
            .inc();

        self.search_metrics
            .search_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record a request refused due to lock contention
    pub fn record_lock_contention(&self) {
        self.search_metrics.lock_contention_total.inc();
    }

    /// Record a new conversation and the winning candidate's queue wait
    pub fn record_pair_created(&self, candidate_wait: Duration) {
        self.pair_metrics.pairs_created_total.inc();
        self.pair_metrics.active_pairs.inc();
        self.queue_metrics
            .queue_wait_seconds
            .observe(candidate_wait.as_secs_f64());
    }

    /// Record a conversation ending
    pub fn record_pair_ended(&self, reason: EndReason, lifetime: Duration) {
        self.pair_metrics
            .pairs_ended_total
            .with_label_values(&[&reason.to_string()])
            .inc();
        self.pair_metrics.active_pairs.dec();
        self.pair_metrics
            .pair_duration_seconds
            .observe(lifetime.as_secs_f64());
    }

    /// Update queue depth gauges
    pub fn update_queue_depth(&self, male: usize, female: usize) {
        self.queue_metrics
            .entries_waiting
            .set((male + female) as i64);
        self.queue_metrics
            .entries_waiting_by_gender
            .with_label_values(&["male"])
            .set(male as i64);
        self.queue_metrics
            .entries_waiting_by_gender
            .with_label_values(&["female"])
            .set(female as i64);
    }

    /// Record cleanup sweep results
    pub fn record_sweep(&self, entries_purged: usize, pairs_purged: usize) {
        self.queue_metrics
            .entries_purged_total
            .inc_by(entries_purged as u64);
        self.pair_metrics
            .pairs_purged_total
            .inc_by(pairs_purged as u64);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to build metrics collector on a fresh registry")
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl SearchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let searches_total = IntCounterVec::new(
            Opts::new(
                "rendezvous_searches_total",
                "Search requests processed, by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(searches_total.clone()))?;

        let search_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "rendezvous_search_duration_seconds",
            "Search request processing time",
        ))?;
        registry.register(Box::new(search_duration_seconds.clone()))?;

        let lock_contention_total = IntCounter::new(
            "rendezvous_lock_contention_total",
            "Requests refused because the per-user lock was held",
        )?;
        registry.register(Box::new(lock_contention_total.clone()))?;

        Ok(Self {
            searches_total,
            search_duration_seconds,
            lock_contention_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let entries_waiting = IntGauge::new(
            "rendezvous_entries_waiting",
            "Users currently waiting for a partner",
        )?;
        registry.register(Box::new(entries_waiting.clone()))?;

        let entries_waiting_by_gender = IntGaugeVec::new(
            Opts::new(
                "rendezvous_entries_waiting_by_gender",
                "Waiting users by gender",
            ),
            &["gender"],
        )?;
        registry.register(Box::new(entries_waiting_by_gender.clone()))?;

        let queue_wait_seconds = Histogram::with_opts(HistogramOpts::new(
            "rendezvous_queue_wait_seconds",
            "Time spent waiting before a match",
        ))?;
        registry.register(Box::new(queue_wait_seconds.clone()))?;

        let entries_purged_total = IntCounter::new(
            "rendezvous_entries_purged_total",
            "Queue entries purged by the cleanup sweep",
        )?;
        registry.register(Box::new(entries_purged_total.clone()))?;

        Ok(Self {
            entries_waiting,
            entries_waiting_by_gender,
            queue_wait_seconds,
            entries_purged_total,
        })
    }
}

impl PairMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let pairs_created_total = IntCounter::new(
            "rendezvous_pairs_created_total",
            "Total conversations created",
        )?;
        registry.register(Box::new(pairs_created_total.clone()))?;

        let pairs_ended_total = IntCounterVec::new(
            Opts::new(
                "rendezvous_pairs_ended_total",
                "Conversations ended, by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(pairs_ended_total.clone()))?;

        let active_pairs = IntGauge::new(
            "rendezvous_active_pairs",
            "Currently active conversations",
        )?;
        registry.register(Box::new(active_pairs.clone()))?;

        let pair_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "rendezvous_pair_duration_seconds",
            "Conversation lifetime from start to end",
        ))?;
        registry.register(Box::new(pair_duration_seconds.clone()))?;

        let pairs_purged_total = IntCounter::new(
            "rendezvous_pairs_purged_total",
            "Ended conversations removed by the retention job",
        )?;
        registry.register(Box::new(pairs_purged_total.clone()))?;

        Ok(Self {
            pairs_created_total,
            pairs_ended_total,
            active_pairs,
            pair_duration_seconds,
            pairs_purged_total,
        })
    }
}
