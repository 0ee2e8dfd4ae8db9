//! Queue health signals for UX feedback
//!
//! Read-only, side-effect-free queries over the pending queue: overcrowding
//! and gender balance. The presentation layer uses these to pick messaging,
//! e.g. offering a switch to random matching when one gender dominates the
//! queue.

use crate::error::Result;
use crate::queue::store::PendingQueueStore;
use crate::types::Gender;
use std::sync::Arc;

/// Thresholds for queue health evaluation
#[derive(Debug, Clone)]
pub struct HealthThresholds {
    /// Queue length above which the queue counts as overcrowded
    pub overcrowd_threshold: usize,
    /// Minimum minority-gender fraction for the queue to count as balanced
    pub min_minority_ratio: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            overcrowd_threshold: 50,
            min_minority_ratio: 0.2,
        }
    }
}

/// Gender balance snapshot of the waiting queue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenderBalance {
    pub male: usize,
    pub female: usize,
    pub is_balanced: bool,
}

/// Read-only monitor over the pending queue
#[derive(Clone)]
pub struct QueueHealthMonitor {
    store: Arc<dyn PendingQueueStore>,
    thresholds: HealthThresholds,
}

impl QueueHealthMonitor {
    pub fn new(store: Arc<dyn PendingQueueStore>, thresholds: HealthThresholds) -> Self {
        Self { store, thresholds }
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    /// Whether the queue length exceeds `threshold`.
    ///
    /// A queue of exactly `threshold` entries is not overcrowded.
    pub async fn is_overcrowded(&self, threshold: usize) -> Result<bool> {
        Ok(self.store.count().await? > threshold)
    }

    /// Overcrowding against the configured threshold
    pub async fn is_overcrowded_now(&self) -> Result<bool> {
        self.is_overcrowded(self.thresholds.overcrowd_threshold)
            .await
    }

    /// Gender balance of the queue. An empty queue is balanced.
    pub async fn gender_balance(&self) -> Result<GenderBalance> {
        let counts = self.store.gender_counts().await?;
        let total = counts.total();

        let is_balanced = if total == 0 {
            true
        } else {
            let minority = counts.male.min(counts.female);
            (minority as f64 / total as f64) >= self.thresholds.min_minority_ratio
        };

        Ok(GenderBalance {
            male: counts.male,
            female: counts.female,
            is_balanced,
        })
    }

    /// The minority gender, or `None` when balanced or empty
    pub async fn underrepresented_gender(&self) -> Result<Option<Gender>> {
        let balance = self.gender_balance().await?;
        if balance.is_balanced {
            return Ok(None);
        }

        if balance.male < balance.female {
            Ok(Some(Gender::Male))
        } else {
            Ok(Some(Gender::Female))
        }
    }
}
