//! Profile provider trait and the static in-memory implementation
//!
//! The profile subsystem owns `UserMatchProfile`; the matching core reads
//! profiles and only writes back the "is currently searching" flag.

use crate::error::{MatchingError, Result};
use crate::types::{UserId, UserMatchProfile};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Trait for reading matching-relevant user data
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Fetch the matching view of a user, failing with `ProfileNotFound` for
    /// unknown users
    async fn get_profile(&self, user_id: UserId) -> Result<UserMatchProfile>;

    /// Whether the user is permanently banned
    async fn is_banned(&self, user_id: UserId) -> Result<bool>;

    /// Whether the user is under an unexpired soft ban
    async fn is_soft_banned(&self, user_id: UserId) -> Result<bool>;

    /// Mirror the "is currently searching" status flag back to the profile
    /// subsystem
    async fn set_searching(&self, user_id: UserId, searching: bool) -> Result<()>;
}

/// Static in-memory profile provider for tests and local development
#[derive(Default)]
pub struct StaticProfileProvider {
    profiles: RwLock<HashMap<UserId, UserMatchProfile>>,
    searching: RwLock<HashSet<UserId>>,
}

impl StaticProfileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile
    pub fn upsert_profile(&self, profile: UserMatchProfile) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(profile.user_id, profile);
        }
    }

    /// Current searching flag (for assertions and monitoring)
    pub fn is_searching(&self, user_id: UserId) -> bool {
        self.searching
            .read()
            .map(|searching| searching.contains(&user_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ProfileProvider for StaticProfileProvider {
    async fn get_profile(&self, user_id: UserId) -> Result<UserMatchProfile> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| MatchingError::InternalError {
                message: "Failed to acquire profile lock".to_string(),
            })?;

        profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| MatchingError::ProfileNotFound { user_id }.into())
    }

    async fn is_banned(&self, user_id: UserId) -> Result<bool> {
        Ok(self.get_profile(user_id).await?.banned)
    }

    async fn is_soft_banned(&self, user_id: UserId) -> Result<bool> {
        let profile = self.get_profile(user_id).await?;
        Ok(profile.is_soft_banned_at(current_timestamp()))
    }

    async fn set_searching(&self, user_id: UserId, searching: bool) -> Result<()> {
        let mut flags = self
            .searching
            .write()
            .map_err(|_| MatchingError::InternalError {
                message: "Failed to acquire searching flag lock".to_string(),
            })?;

        if searching {
            flags.insert(user_id);
        } else {
            flags.remove(&user_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Gender, Preference};
    use chrono::Duration;

    fn profile(user_id: UserId) -> UserMatchProfile {
        UserMatchProfile {
            user_id,
            gender: Gender::Female,
            preference: Preference::Any,
            age: Some(30),
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
    async fn test_get_profile() {
        let provider = StaticProfileProvider::new();
        provider.upsert_profile(profile(1));

        let fetched = provider.get_profile(1).await.unwrap();
        assert_eq!(fetched.user_id, 1);

        let err = provider.get_profile(2).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchingError>(),
            Some(MatchingError::ProfileNotFound { user_id: 2 })
        ));
    }

    #[tokio::test]
    async fn test_ban_flags() {
        let provider = StaticProfileProvider::new();

        let mut banned = profile(1);
        banned.banned = true;
        provider.upsert_profile(banned);
        assert!(provider.is_banned(1).await.unwrap());

        let mut soft = profile(2);
        soft.soft_banned_until = Some(current_timestamp() + Duration::hours(1));
        provider.upsert_profile(soft);
        assert!(provider.is_soft_banned(2).await.unwrap());
        assert!(!provider.is_banned(2).await.unwrap());

        let mut lapsed = profile(3);
        lapsed.soft_banned_until = Some(current_timestamp() - Duration::hours(1));
        provider.upsert_profile(lapsed);
        assert!(!provider.is_soft_banned(3).await.unwrap());
    }

    #[tokio::test]
    async fn test_searching_flag() {
        let provider = StaticProfileProvider::new();
        provider.upsert_profile(profile(1));

        assert!(!provider.is_searching(1));
        provider.set_searching(1, true).await.unwrap();
        assert!(provider.is_searching(1));
        provider.set_searching(1, false).await.unwrap();
        assert!(!provider.is_searching(1));
    }
}
