//! Candidate matching for the pending queue
//!
//! Pure selection logic: policy-driven eligibility, FIFO-first ordering, and
//! weighted compatibility scoring for equally-old candidates.

pub mod matcher;
pub mod score;

pub use matcher::{Candidate, CandidateMatcher, MatchContext, ScoredMatcher};
pub use score::ScoringWeights;
