// Profile builder — fetches one user's listening history and vectorizes it.
//
// Given a user record, this module:
// 1. Resolves the linked Last.fm username
// 2. Fetches their top artists and top tracks
// 3. Builds the weighted artist and track vectors
// 4. Returns a TasteProfile ready for caching
//
// Persistence is the caller's job.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::TasteProfile;
use crate::db::models::UserRecord;
use crate::error::{MatchError, Result};
use crate::lastfm::traits::{ListeningHistorySource, Period};

/// How much history to fetch per profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileConfig {
    /// Top artists to fetch (default 50)
    pub artist_limit: u32,
    /// Top tracks to fetch (default 100)
    pub track_limit: u32,
    /// Aggregation window (default overall)
    pub period: Period,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            artist_limit: 50,
            track_limit: 100,
            period: Period::Overall,
        }
    }
}

pub struct ProfileBuilder {
    source: Arc<dyn ListeningHistorySource>,
    config: ProfileConfig,
}

impl ProfileBuilder {
    pub fn new(source: Arc<dyn ListeningHistorySource>, config: ProfileConfig) -> Self {
        Self { source, config }
    }

    /// Build a profile for a stored user.
    ///
    /// Fails with `NoIdentitySource` if the user has no linked Last.fm account.
    pub async fn build(&self, user: &UserRecord) -> Result<TasteProfile> {
        let username = user
            .source_username()
            .ok_or_else(|| MatchError::NoIdentitySource(user.code.clone()))?;
        self.build_for(&user.code, &user.name, username).await
    }

    /// Build a profile straight from a Last.fm username.
    ///
    /// Source errors are returned unchanged; nothing is retried.
    pub async fn build_for(
        &self,
        identity: &str,
        display_name: &str,
        username: &str,
    ) -> Result<TasteProfile> {
        let username = username.trim();
        if username.is_empty() {
            return Err(MatchError::NoIdentitySource(identity.to_string()));
        }

        let artists = self
            .source
            .top_artists(username, self.config.period, self.config.artist_limit)
            .await?;
        let tracks = self
            .source
            .top_tracks(username, self.config.period, self.config.track_limit)
            .await?;

        let profile =
            TasteProfile::from_history(identity, display_name, username, &artists, &tracks, Utc::now());

        info!(
            identity = identity,
            lastfm = username,
            artists = profile.metadata.total_artists,
            tracks = profile.metadata.total_tracks,
            "Built taste profile"
        );

        Ok(profile)
    }
}
