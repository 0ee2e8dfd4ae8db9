//! Common types used throughout the matchmaking core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for chat users
pub type UserId = i64;

/// Unique identifier for conversation pairs
pub type PairId = Uuid;

/// Gender of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// Partner-gender preference attached to a search request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Preference {
    Male,
    Female,
    Any,
}

impl Preference {
    /// Whether a partner of the given gender satisfies this preference
    pub fn accepts(&self, gender: Gender) -> bool {
        match self {
            Preference::Male => gender == Gender::Male,
            Preference::Female => gender == Gender::Female,
            Preference::Any => true,
        }
    }
}

impl std::fmt::Display for Preference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Preference::Male => write!(f, "male"),
            Preference::Female => write!(f, "female"),
            Preference::Any => write!(f, "any"),
        }
    }
}

/// Global match policy toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPolicy {
    /// Mutual gender/interest compatibility is required
    Strict,
    /// Gender/interest constraints are ignored entirely
    Random,
}

/// Geographic coordinates for location-proximity scoring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Matching-relevant view of a user, owned by the external profile subsystem.
///
/// Read-only input to the matching core; mutations other than the
/// "is currently searching" flag happen elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMatchProfile {
    pub user_id: UserId,
    pub gender: Gender,
    pub preference: Preference,
    pub age: Option<u32>,
    pub location: Option<GeoPoint>,
    /// Preferred search radius in kilometers, if the user set one
    pub search_radius_km: Option<f64>,
    pub banned: bool,
    pub soft_banned_until: Option<DateTime<Utc>>,
    pub premium: bool,
    /// Recent activity signal in `0.0..=1.0`
    pub activity_score: f64,
    /// Average conversation rating in `1.0..=5.0`, if any ratings exist
    pub rating: Option<f64>,
    /// Conversations started inside the variety window
    pub recent_pair_count: u32,
}

impl UserMatchProfile {
    /// Whether the soft ban (if any) is still in effect at `now`
    pub fn is_soft_banned_at(&self, now: DateTime<Utc>) -> bool {
        self.soft_banned_until.map(|until| until > now).unwrap_or(false)
    }
}

/// One waiting user in the pending queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEntry {
    pub user_id: UserId,
    pub gender: Gender,
    /// Preference snapshot taken when the search started
    pub preference: Preference,
    pub enqueued_at: DateTime<Utc>,
}

/// Lifecycle state of a conversation pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairStatus {
    Active,
    Ended,
}

impl std::fmt::Display for PairStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairStatus::Active => write!(f, "active"),
            PairStatus::Ended => write!(f, "ended"),
        }
    }
}

/// Why a conversation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndReason {
    /// A participant issued an explicit stop
    UserStop,
    /// A participant requested the next partner
    NextRequested,
    /// The cleanup sweep ended an inactive or over-long conversation
    AutoEnded,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndReason::UserStop => write!(f, "user_stop"),
            EndReason::NextRequested => write!(f, "next_requested"),
            EndReason::AutoEnded => write!(f, "auto_ended"),
        }
    }
}

/// A conversation between two matched users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pair {
    pub id: PairId,
    pub user_id: UserId,
    pub partner_id: UserId,
    pub status: PairStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub ended_by: Option<UserId>,
    pub end_reason: Option<EndReason>,
    pub last_message_at: DateTime<Utc>,
    pub message_count: u64,
    /// Rating left by `user_id`, if any
    pub rating_by_user: Option<u8>,
    /// Rating left by `partner_id`, if any
    pub rating_by_partner: Option<u8>,
}

impl Pair {
    /// Whether the given user participates in this pair
    pub fn involves(&self, user_id: UserId) -> bool {
        self.user_id == user_id || self.partner_id == user_id
    }

    /// The other participant, if `user_id` is one of the two
    pub fn partner_of(&self, user_id: UserId) -> Option<UserId> {
        if self.user_id == user_id {
            Some(self.partner_id)
        } else if self.partner_id == user_id {
            Some(self.user_id)
        } else {
            None
        }
    }
}

/// Notification Event Types
/// Event emitted when two users are matched into a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCreated {
    pub pair_id: PairId,
    pub user_id: UserId,
    pub partner_id: UserId,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a user is placed into the waiting queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedForMatch {
    pub user_id: UserId,
    /// FIFO rank in the queue, starting at 1
    pub position: usize,
    pub total_waiting: usize,
    pub is_overcrowded: bool,
    /// The minority gender in the queue, when the queue is unbalanced
    pub underrepresented_gender: Option<Gender>,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a conversation ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairEnded {
    pub pair_id: PairId,
    pub user_id: UserId,
    pub partner_id: UserId,
    pub ended_by: Option<UserId>,
    pub reason: EndReason,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a request is refused because another operation holds
/// the user's lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchLocked {
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a never-matched queue entry is purged by the sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchExpired {
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all outbound notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotificationEvent {
    MatchCreated(MatchCreated),
    QueuedForMatch(QueuedForMatch),
    PairEnded(PairEnded),
    SearchLocked(SearchLocked),
    SearchExpired(SearchExpired),
}
