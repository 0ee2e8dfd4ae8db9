//! Candidate selection over a pending-queue sample
//!
//! Given the requester's profile and a FIFO-ordered sample of waiting
//! candidates, pick the partner to claim. The oldest eligible entry wins;
//! the compatibility score only decides between candidates enqueued at the
//! same instant.

use crate::matching::score::ScoringWeights;
use crate::types::{MatchPolicy, PendingEntry, UserId, UserMatchProfile};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// A waiting user with the profile data needed for eligibility and scoring
#[derive(Debug, Clone)]
pub struct Candidate {
    pub entry: PendingEntry,
    pub profile: UserMatchProfile,
}

/// Per-request matching context assembled by the orchestration layer
#[derive(Debug, Clone)]
pub struct MatchContext {
    pub policy: MatchPolicy,
    pub now: DateTime<Utc>,
    /// Partners the requester conversed with inside the variety cooldown
    pub recent_partners: HashSet<UserId>,
}

impl MatchContext {
    pub fn new(policy: MatchPolicy, now: DateTime<Utc>) -> Self {
        Self {
            policy,
            now,
            recent_partners: HashSet::new(),
        }
    }

    pub fn with_recent_partners(mut self, partners: HashSet<UserId>) -> Self {
        self.recent_partners = partners;
        self
    }
}

/// Trait for candidate selection algorithms
pub trait CandidateMatcher: Send + Sync {
    /// Index of the best candidate in `candidates`, or `None` when no one is
    /// eligible
    fn select_candidate(
        &self,
        requester: &UserMatchProfile,
        candidates: &[Candidate],
        ctx: &MatchContext,
    ) -> Option<usize>;

    /// Whether a single candidate is eligible for the requester
    fn is_eligible(
        &self,
        requester: &UserMatchProfile,
        candidate: &Candidate,
        ctx: &MatchContext,
    ) -> bool;
}

/// FIFO-first matcher with score-based tie-breaking
#[derive(Debug, Default)]
pub struct ScoredMatcher {
    weights: ScoringWeights,
}

impl ScoredMatcher {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Gender/interest compatibility under the strict policy.
    ///
    /// Both directions must hold: the candidate accepts the requester's
    /// gender, and the requester accepts the candidate's. The preference
    /// checked for the candidate is the snapshot stored in their queue entry,
    /// so a mid-wait switch to random matching takes effect here.
    fn strict_compatible(requester: &UserMatchProfile, candidate: &Candidate) -> bool {
        candidate.entry.preference.accepts(requester.gender)
            && requester.preference.accepts(candidate.entry.gender)
    }
}

impl CandidateMatcher for ScoredMatcher {
    fn select_candidate(
        &self,
        requester: &UserMatchProfile,
        candidates: &[Candidate],
        ctx: &MatchContext,
    ) -> Option<usize> {
        let eligible: Vec<usize> = (0..candidates.len())
            .filter(|&idx| self.is_eligible(requester, &candidates[idx], ctx))
            .collect();

        let oldest_at = eligible
            .iter()
            .map(|&idx| candidates[idx].entry.enqueued_at)
            .min()?;

        // Scoring only ranks the candidates that share the oldest timestamp;
        // residual ties keep sample order, which is FIFO.
        let mut best: Option<(usize, f64)> = None;
        for &idx in &eligible {
            if candidates[idx].entry.enqueued_at != oldest_at {
                continue;
            }
            let score = self.weights.score(requester, &candidates[idx].profile);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((idx, score)),
            }
        }

        best.map(|(idx, _)| idx)
    }

    fn is_eligible(
        &self,
        requester: &UserMatchProfile,
        candidate: &Candidate,
        ctx: &MatchContext,
    ) -> bool {
        // A user is never matched with themself
        if candidate.entry.user_id == requester.user_id {
            return false;
        }

        if candidate.profile.banned || candidate.profile.is_soft_banned_at(ctx.now) {
            return false;
        }

        if ctx.recent_partners.contains(&candidate.entry.user_id) {
            return false;
        }

        match ctx.policy {
            MatchPolicy::Strict => Self::strict_compatible(requester, candidate),
            MatchPolicy::Random => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Gender, Preference};
    use crate::utils::current_timestamp;
    use chrono::Duration;

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

    fn candidate(
        user_id: UserId,
        gender: Gender,
        preference: Preference,
        enqueued_at: DateTime<Utc>,
    ) -> Candidate {
        Candidate {
            entry: PendingEntry {
                user_id,
                gender,
                preference,
                enqueued_at,
            },
            profile: profile(user_id, gender, preference),
        }
    }

    fn strict_ctx() -> MatchContext {
        MatchContext::new(MatchPolicy::Strict, current_timestamp())
    }

    #[test]
    fn test_strict_mutual_compatibility() {
        let matcher = ScoredMatcher::default();
        let ctx = strict_ctx();
        let now = current_timestamp();

        let requester = profile(1, Gender::Male, Preference::Female);

        // Mutual fit
        let fit = candidate(2, Gender::Female, Preference::Male, now);
        assert!(matcher.is_eligible(&requester, &fit, &ctx));

        // Candidate fits the requester but not vice versa
        let wrong_gender = candidate(3, Gender::Male, Preference::Male, now);
        assert!(!matcher.is_eligible(&requester, &wrong_gender, &ctx));

        // Requester fits the candidate but not vice versa
        let wants_female = candidate(4, Gender::Female, Preference::Female, now);
        assert!(!matcher.is_eligible(&requester, &wants_female, &ctx));
    }

    #[test]
    fn test_strict_any_preference_is_symmetric() {
        let matcher = ScoredMatcher::default();
        let ctx = strict_ctx();
        let now = current_timestamp();

        let requester = profile(1, Gender::Male, Preference::Any);

        // Candidate specifically wants the requester's gender
        let wants_male = candidate(2, Gender::Female, Preference::Male, now);
        assert!(matcher.is_eligible(&requester, &wants_male, &ctx));

        // Candidate with any-preference also fits
        let open = candidate(3, Gender::Female, Preference::Any, now);
        assert!(matcher.is_eligible(&requester, &open, &ctx));
    }

    #[test]
    fn test_strict_exclusion_male_wanting_male() {
        let matcher = ScoredMatcher::default();
        let ctx = strict_ctx();
        let now = current_timestamp();

        // Male wanting male must not match a male wanting female
        let requester = profile(1, Gender::Male, Preference::Male);
        let waiting = candidate(2, Gender::Male, Preference::Female, now);

        assert!(!matcher.is_eligible(&requester, &waiting, &ctx));
        assert_eq!(matcher.select_candidate(&requester, &[waiting], &ctx), None);
    }

    #[test]
    fn test_random_policy_ignores_gender_constraints() {
        let matcher = ScoredMatcher::default();
        let ctx = MatchContext::new(MatchPolicy::Random, current_timestamp());
        let now = current_timestamp();

        let requester = profile(1, Gender::Male, Preference::Male);
        let incompatible = candidate(2, Gender::Male, Preference::Female, now);

        assert!(matcher.is_eligible(&requester, &incompatible, &ctx));
    }

    #[test]
    fn test_always_excluded() {
        let matcher = ScoredMatcher::default();
        let now = current_timestamp();
        let requester = profile(1, Gender::Male, Preference::Any);

        // Self
        let myself = candidate(1, Gender::Male, Preference::Any, now);
        assert!(!matcher.is_eligible(&requester, &myself, &strict_ctx()));

        // Banned
        let mut banned = candidate(2, Gender::Female, Preference::Any, now);
        banned.profile.banned = true;
        assert!(!matcher.is_eligible(&requester, &banned, &strict_ctx()));

        // Soft ban still in effect
        let mut soft = candidate(3, Gender::Female, Preference::Any, now);
        soft.profile.soft_banned_until = Some(now + Duration::hours(1));
        assert!(!matcher.is_eligible(&requester, &soft, &strict_ctx()));

        // Expired soft ban no longer excludes
        let mut lapsed = candidate(4, Gender::Female, Preference::Any, now);
        lapsed.profile.soft_banned_until = Some(now - Duration::hours(1));
        assert!(matcher.is_eligible(&requester, &lapsed, &strict_ctx()));

        // Recent partner cooldown
        let repeat = candidate(5, Gender::Female, Preference::Any, now);
        let ctx = strict_ctx().with_recent_partners([5].into_iter().collect());
        assert!(!matcher.is_eligible(&requester, &repeat, &ctx));
    }

    #[test]
    fn test_fifo_order_beats_score() {
        let matcher = ScoredMatcher::default();
        let ctx = strict_ctx();
        let base = current_timestamp();

        let requester = profile(1, Gender::Male, Preference::Any);

        // The newer candidate scores far higher but the older one must win
        let older = candidate(2, Gender::Female, Preference::Any, base);
        let mut newer = candidate(3, Gender::Female, Preference::Any, base + Duration::seconds(5));
        newer.profile.premium = true;
        newer.profile.activity_score = 1.0;
        newer.profile.rating = Some(5.0);

        let picked = matcher
            .select_candidate(&requester, &[older, newer], &ctx)
            .unwrap();
        assert_eq!(picked, 0);
    }

    #[test]
    fn test_score_breaks_equal_age_ties() {
        let matcher = ScoredMatcher::default();
        let ctx = strict_ctx();
        let at = current_timestamp();

        let requester = profile(1, Gender::Male, Preference::Any);

        let plain = candidate(2, Gender::Female, Preference::Any, at);
        let mut premium = candidate(3, Gender::Female, Preference::Any, at);
        premium.profile.premium = true;
        premium.profile.rating = Some(5.0);

        let picked = matcher
            .select_candidate(&requester, &[plain, premium], &ctx)
            .unwrap();
        assert_eq!(picked, 1);
    }

    #[test]
    fn test_residual_ties_fall_back_to_fifo() {
        let matcher = ScoredMatcher::default();
        let ctx = strict_ctx();
        let at = current_timestamp();

        let requester = profile(1, Gender::Male, Preference::Any);

        // Identical profiles enqueued at the same instant: first in sample wins
        let first = candidate(2, Gender::Female, Preference::Any, at);
        let second = candidate(3, Gender::Female, Preference::Any, at);

        let picked = matcher
            .select_candidate(&requester, &[first, second], &ctx)
            .unwrap();
        assert_eq!(picked, 0);
    }

    #[test]
    fn test_empty_pool() {
        let matcher = ScoredMatcher::default();
        let requester = profile(1, Gender::Male, Preference::Any);
        assert_eq!(
            matcher.select_candidate(&requester, &[], &strict_ctx()),
            None
        );
    }
}
