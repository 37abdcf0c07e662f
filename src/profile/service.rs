// Profile service — the per-identity operations callers use.
//
// Ties the cache and the builder together: read the cache, and on a miss
// (or a forced refresh) build from Last.fm and write the result back.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::builder::ProfileBuilder;
use super::cache::ProfileCache;
use super::TasteProfile;
use crate::config::MatchingConfig;
use crate::db::records;
use crate::db::DocumentStore;
use crate::error::{MatchError, Result};
use crate::lastfm::traits::ListeningHistorySource;

pub struct ProfileService {
    store: Arc<dyn DocumentStore>,
    cache: ProfileCache,
    builder: ProfileBuilder,
}

impl ProfileService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        source: Arc<dyn ListeningHistorySource>,
        config: &MatchingConfig,
    ) -> Self {
        Self {
            cache: ProfileCache::new(Arc::clone(&store), config.freshness),
            builder: ProfileBuilder::new(source, config.profile.clone()),
            store,
        }
    }

    pub fn cache(&self) -> &ProfileCache {
        &self.cache
    }

    /// Return a fresh profile for `identity`, building and caching one if
    /// needed. `force_refresh` skips the cache read entirely.
    pub async fn get_or_build(&self, identity: &str, force_refresh: bool) -> Result<TasteProfile> {
        let user = records::load_user(self.store.as_ref(), identity)
            .await?
            .ok_or_else(|| MatchError::IdentityNotFound(identity.to_string()))?;

        if force_refresh {
            debug!(identity = identity, "Forced profile refresh");
        } else if let Some(profile) = self.cache.fresh_from_user(&user, Utc::now()) {
            return Ok(profile);
        }

        info!(identity = identity, "Building profile");
        let profile = self.builder.build(&user).await?;
        self.cache.put(identity, &profile).await?;
        Ok(profile)
    }

    /// Return the cached profile for `identity` without building one.
    ///
    /// Fails with `IdentityNotFound` when the user doesn't exist; a user
    /// without a fresh cached profile yields None.
    pub async fn cached(&self, identity: &str) -> Result<Option<TasteProfile>> {
        let user = records::load_user(self.store.as_ref(), identity)
            .await?
            .ok_or_else(|| MatchError::IdentityNotFound(identity.to_string()))?;
        Ok(self.cache.fresh_from_user(&user, Utc::now()))
    }
}
