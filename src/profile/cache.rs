// Profile cache — stored taste profiles with a freshness window.
//
// Profiles live inside the user document under
// `profileData.listeningHistory`. A cached profile older than the freshness
// window reads as absent. A miss never triggers a rebuild here; that is
// ProfileService's job.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{ProfileMetadata, TasteProfile};
use crate::db::models::{Collection, UserRecord};
use crate::db::records;
use crate::db::DocumentStore;
use crate::error::{MatchError, Result};
use crate::similarity::TasteVector;

/// Default freshness window for cached profiles.
pub const DEFAULT_FRESHNESS_HOURS: i64 = 24;

pub struct ProfileCache {
    store: Arc<dyn DocumentStore>,
    freshness: Duration,
}

// The parts of a stored profile the cache trusts. Identity and names are
// taken from the user record itself so renames show up immediately.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProfile {
    artist_vector: TasteVector,
    track_vector: TasteVector,
    metadata: ProfileMetadata,
}

impl ProfileCache {
    pub fn new(store: Arc<dyn DocumentStore>, freshness: Duration) -> Self {
        Self { store, freshness }
    }

    /// Return the cached profile for `identity` if one exists and is fresh.
    pub async fn get(&self, identity: &str) -> Result<Option<TasteProfile>> {
        self.get_at(identity, Utc::now()).await
    }

    /// Like `get`, with an explicit clock.
    pub async fn get_at(&self, identity: &str, now: DateTime<Utc>) -> Result<Option<TasteProfile>> {
        match records::load_user(self.store.as_ref(), identity).await? {
            Some(user) => Ok(self.fresh_from_user(&user, now)),
            None => Ok(None),
        }
    }

    /// Extract a fresh cached profile from an already-loaded user record.
    ///
    /// A stored profile that fails to decode or holds invalid weights is
    /// logged and treated as absent.
    pub fn fresh_from_user(&self, user: &UserRecord, now: DateTime<Utc>) -> Option<TasteProfile> {
        let raw = user.profile_data.listening_history.as_ref()?;
        if raw.is_null() {
            return None;
        }

        let stored: StoredProfile = match serde_json::from_value(raw.clone()) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(identity = %user.code, error = %e, "Ignoring unreadable cached profile");
                return None;
            }
        };

        if !self.is_fresh(stored.metadata.created_at, now) {
            debug!(
                identity = %user.code,
                age_hours = (now - stored.metadata.created_at).num_hours(),
                "Cached profile expired"
            );
            return None;
        }

        let profile = TasteProfile {
            identity: user.code.clone(),
            display_name: user.name.clone(),
            source_username: user.lastfm_username.clone().unwrap_or_default(),
            artist_vector: stored.artist_vector,
            track_vector: stored.track_vector,
            metadata: stored.metadata,
        };
        if let Err(e) = profile.validate() {
            warn!(identity = %user.code, error = %e, "Ignoring invalid cached profile");
            return None;
        }

        debug!(identity = %user.code, "Using cached profile");
        Some(profile)
    }

    /// Store `profile` for `identity`, replacing any previous one, and bump
    /// the user's `updatedAt` marker.
    pub async fn put(&self, identity: &str, profile: &TasteProfile) -> Result<()> {
        let fields = json!({
            "profileData.listeningHistory": profile,
            "updatedAt": Utc::now(),
        });

        let updated = self
            .store
            .update_fields(Collection::Users, identity, &fields)
            .await?;
        if !updated {
            return Err(MatchError::IdentityNotFound(identity.to_string()));
        }

        debug!(identity = identity, "Stored taste profile");
        Ok(())
    }

    /// True if a profile built at `created_at` is still fresh at `now`.
    pub fn is_fresh(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - created_at <= self.freshness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteStore;
    use crate::lastfm::traits::TopArtist;

    async fn cache_with_user() -> ProfileCache {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::in_memory().unwrap());
        records::save_user(store.as_ref(), &UserRecord::new("U1", "Ana", Some("ana_fm")))
            .await
            .unwrap();
        ProfileCache::new(store, Duration::hours(DEFAULT_FRESHNESS_HOURS))
    }

    fn profile_built_at(created_at: DateTime<Utc>) -> TasteProfile {
        let artists = vec![TopArtist {
            name: "Radiohead".to_string(),
            playcount: 50,
        }];
        TasteProfile::from_history("U1", "Ana", "ana_fm", &artists, &[], created_at)
    }

    #[tokio::test]
    async fn test_miss_when_nothing_cached() {
        let cache = cache_with_user().await;
        assert!(cache.get("U1").await.unwrap().is_none());
        assert!(cache.get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = cache_with_user().await;
        let profile = profile_built_at(Utc::now());
        cache.put("U1", &profile).await.unwrap();

        let cached = cache.get("U1").await.unwrap().unwrap();
        assert_eq!(cached.artist_vector, profile.artist_vector);
        assert_eq!(cached.display_name, "Ana");
    }

    #[tokio::test]
    async fn test_put_unknown_identity() {
        let cache = cache_with_user().await;
        let err = cache.put("nobody", &profile_built_at(Utc::now())).await.unwrap_err();
        assert!(matches!(err, MatchError::IdentityNotFound(_)));
    }

    #[tokio::test]
    async fn test_freshness_window() {
        let cache = cache_with_user().await;
        let now = Utc::now();

        cache.put("U1", &profile_built_at(now - Duration::hours(23))).await.unwrap();
        assert!(cache.get_at("U1", now).await.unwrap().is_some());

        cache.put("U1", &profile_built_at(now - Duration::hours(25))).await.unwrap();
        assert!(cache.get_at("U1", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_cached_profile_is_a_miss() {
        let cache = cache_with_user().await;
        cache
            .store
            .update_fields(
                Collection::Users,
                "U1",
                &json!({"profileData.listeningHistory": {"artistVector": "oops"}}),
            )
            .await
            .unwrap();
        assert!(cache.get("U1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_weights_are_a_miss() {
        let cache = cache_with_user().await;
        cache
            .store
            .update_fields(
                Collection::Users,
                "U1",
                &json!({"profileData.listeningHistory": {
                    "artistVector": {"radiohead": -1.0},
                    "trackVector": {},
                    "metadata": {
                        "totalArtists": 1,
                        "totalTracks": 0,
                        "createdAt": Utc::now(),
                        "dataSource": "lastfm"
                    }
                }}),
            )
            .await
            .unwrap();
        assert!(cache.get("U1").await.unwrap().is_none());
    }

    #[test]
    fn test_is_fresh_boundary() {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let cache = ProfileCache::new(store, Duration::hours(24));
        let now = Utc::now();
        assert!(cache.is_fresh(now - Duration::hours(24), now));
        assert!(!cache.is_fresh(now - Duration::hours(24) - Duration::seconds(1), now));
    }
}
