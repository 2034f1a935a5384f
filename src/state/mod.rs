use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::{Cache, CacheBuilder};
use thiserror::Error;

use crate::config::{CacheConfig, SignupMode};
use crate::media::MediaUploader;
use crate::models::auth::UserProfile;
use crate::store::AuthStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AuthStore>,
    pub media: Arc<dyn MediaUploader>,
    pub profiles: Arc<dyn ProfileCache>,
    pub signup_mode: SignupMode,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AuthStore>,
        media: Arc<dyn MediaUploader>,
        profiles: Arc<dyn ProfileCache>,
        signup_mode: SignupMode,
    ) -> Self {
        Self {
            store,
            media,
            profiles,
            signup_mode,
            start_time: Instant::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Profile cache rejected {key}: {reason}")]
    Rejected { key: String, reason: String },
}

/// Fast-read mirror of user profiles.
#[async_trait]
pub trait ProfileCache: Send + Sync {
    /// Stores `profile` under `key` and indexes it by the numeric `uid`.
    async fn save_profile(
        &self,
        key: &str,
        uid: &str,
        profile: UserProfile,
    ) -> Result<(), CacheError>;

    fn entry_count(&self) -> u64;
}

pub struct MokaProfileCache {
    profiles: Cache<String, Arc<UserProfile>>,
    keys_by_uid: Cache<String, String>,
}

impl MokaProfileCache {
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.profiles_max_capacity >= 100,
            "Profile cache capacity threshold"
        );

        Self {
            profiles: profile_cache_builder(config).build(),
            keys_by_uid: profile_cache_builder(config).build(),
        }
    }
}

/// Both the profiles and their uid index expire on the same schedule.
fn profile_cache_builder<V>(config: &CacheConfig) -> CacheBuilder<String, V, Cache<String, V>>
where
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(config.profiles_max_capacity)
        .time_to_live(Duration::from_secs(config.profiles_ttl_seconds))
        .time_to_idle(Duration::from_secs(config.profiles_ttl_seconds / 2 + 1))
}

#[async_trait]
impl ProfileCache for MokaProfileCache {
    async fn save_profile(
        &self,
        key: &str,
        uid: &str,
        profile: UserProfile,
    ) -> Result<(), CacheError> {
        if key.is_empty() || uid.is_empty() {
            return Err(CacheError::Rejected {
                key: key.to_string(),
                reason: "key and uid must be non-empty".to_string(),
            });
        }
        self.profiles
            .insert(key.to_string(), Arc::new(profile))
            .await;
        self.keys_by_uid
            .insert(uid.to_string(), key.to_string())
            .await;
        Ok(())
    }

    fn entry_count(&self) -> u64 {
        self.profiles.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{SignupIds, build_auth_document, build_user_profile};
    use chrono::Utc;

    fn cache() -> MokaProfileCache {
        MokaProfileCache::new(&CacheConfig {
            profiles_max_capacity: 1_000,
            profiles_ttl_seconds: 3_600,
        })
    }

    async fn profile_by_uid(cache: &MokaProfileCache, uid: &str) -> Option<Arc<UserProfile>> {
        let key = cache.keys_by_uid.get(uid).await?;
        cache.profiles.get(&key).await
    }

    fn profile(ids: &SignupIds) -> UserProfile {
        let auth = build_auth_document(ids, "carol", "carol@x.com", "pw1234", "teal", Utc::now());
        build_user_profile(&auth, ids.profile_id, "https://img/carol".to_string())
    }

    #[tokio::test]
    async fn saved_profile_is_readable_by_key_and_uid() {
        let cache = cache();
        let ids = SignupIds::generate();
        let key = ids.profile_id.to_string();

        cache
            .save_profile(&key, &ids.u_id, profile(&ids))
            .await
            .expect("save succeeds");

        let by_key = cache.profiles.get(&key).await.expect("present by key");
        assert_eq!(by_key.username, "Carol");
        let by_uid = profile_by_uid(&cache, &ids.u_id)
            .await
            .expect("present by uid");
        assert_eq!(by_uid.id, ids.profile_id);
    }

    #[test]
    fn uid_index_expires_like_profiles() {
        let cache = cache();
        let profiles = cache.profiles.policy();
        let index = cache.keys_by_uid.policy();
        assert_eq!(index.time_to_live(), profiles.time_to_live());
        assert_eq!(index.time_to_idle(), profiles.time_to_idle());
        assert_eq!(index.time_to_idle(), Some(Duration::from_secs(1_801)));
        assert_eq!(index.max_capacity(), profiles.max_capacity());
    }

    #[tokio::test]
    async fn unknown_keys_miss() {
        let cache = cache();
        assert!(cache.profiles.get("missing").await.is_none());
        assert!(profile_by_uid(&cache, "000000000000").await.is_none());
    }

    #[tokio::test]
    async fn empty_keys_are_rejected() {
        let cache = cache();
        let ids = SignupIds::generate();
        let result = cache.save_profile("", &ids.u_id, profile(&ids)).await;
        assert!(matches!(result, Err(CacheError::Rejected { .. })));
    }
}
