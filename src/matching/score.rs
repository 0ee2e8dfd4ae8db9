//! Weighted compatibility scoring
//!
//! Scores only break ties between equally-old queue entries; FIFO order
//! stays the primary guarantee. All bonuses are additive and capped, and the
//! final score is clamped to be non-negative.

use crate::types::UserMatchProfile;
use crate::utils::{age_difference, distance_km};

/// Weights for the compatibility score components
#[derive(Debug, Clone)]
pub struct ScoringWeights {
    /// Base score every eligible candidate starts from
    pub base: f64,
    /// Maximum age-proximity bonus, at identical ages
    pub age_bonus_max: f64,
    /// Bonus lost per year of age difference
    pub age_falloff_per_year: f64,
    /// Maximum location-proximity bonus, at zero distance
    pub location_bonus_max: f64,
    /// Distance at which the location bonus reaches zero
    pub location_max_distance_km: f64,
    /// Maximum bonus for a fully active candidate
    pub activity_bonus_max: f64,
    /// Flat bonus for premium candidates
    pub premium_bonus: f64,
    /// Maximum bonus for a top-rated candidate
    pub rating_bonus_max: f64,
    /// Recent pairings a candidate may have before the variety penalty kicks in
    pub variety_free_pairs: u32,
    /// Penalty per recent pairing beyond the free allowance
    pub variety_penalty_per_pair: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            base: 10.0,
            age_bonus_max: 5.0,
            age_falloff_per_year: 0.5,
            location_bonus_max: 5.0,
            location_max_distance_km: 300.0,
            activity_bonus_max: 2.0,
            premium_bonus: 1.5,
            rating_bonus_max: 2.0,
            variety_free_pairs: 5,
            variety_penalty_per_pair: 0.5,
        }
    }
}

impl ScoringWeights {
    /// Compatibility score of `candidate` for `requester`, clamped to `>= 0`
    pub fn score(&self, requester: &UserMatchProfile, candidate: &UserMatchProfile) -> f64 {
        let mut total = self.base;

        total += self.age_proximity_bonus(requester, candidate);
        total += self.location_proximity_bonus(requester, candidate);
        total += self.activity_bonus(candidate);
        if candidate.premium {
            total += self.premium_bonus;
        }
        total += self.rating_bonus(candidate);
        total -= self.variety_penalty(candidate);

        total.max(0.0)
    }

    /// Decreases with |Δage|, zero when either age is unknown
    fn age_proximity_bonus(&self, requester: &UserMatchProfile, candidate: &UserMatchProfile) -> f64 {
        match age_difference(requester.age, candidate.age) {
            Some(delta) => {
                (self.age_bonus_max - self.age_falloff_per_year * delta as f64).max(0.0)
            }
            None => 0.0,
        }
    }

    /// Decreases with distance, zero when either side lacks a location
    fn location_proximity_bonus(
        &self,
        requester: &UserMatchProfile,
        candidate: &UserMatchProfile,
    ) -> f64 {
        match (&requester.location, &candidate.location) {
            (Some(a), Some(b)) => {
                let distance = distance_km(a, b);
                let max_distance = requester
                    .search_radius_km
                    .unwrap_or(self.location_max_distance_km)
                    .max(1.0);
                (self.location_bonus_max * (1.0 - distance / max_distance)).clamp(0.0, self.location_bonus_max)
            }
            _ => 0.0,
        }
    }

    fn activity_bonus(&self, candidate: &UserMatchProfile) -> f64 {
        self.activity_bonus_max * candidate.activity_score.clamp(0.0, 1.0)
    }

    /// Scales the 1-5 average rating into `0..=rating_bonus_max`
    fn rating_bonus(&self, candidate: &UserMatchProfile) -> f64 {
        match candidate.rating {
            Some(rating) => {
                let normalized = ((rating - 1.0) / 4.0).clamp(0.0, 1.0);
                self.rating_bonus_max * normalized
            }
            None => 0.0,
        }
    }

    /// Penalizes candidates with unusually high recent pairing counts
    fn variety_penalty(&self, candidate: &UserMatchProfile) -> f64 {
        let excess = candidate
            .recent_pair_count
            .saturating_sub(self.variety_free_pairs);
        self.variety_penalty_per_pair * excess as f64
    }
}
