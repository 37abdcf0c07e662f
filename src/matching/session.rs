// Session matcher — pairwise compatibility across a session's participants.
//
// Strategy: load the participant list, acquire every participant's profile
// (cache first, build on a miss) with bounded parallelism, score every
// unordered pair, rank by overall score, and write the result back onto the
// session. One participant's failure only removes that participant; the
// batch fails as a whole only if fewer than two profiles survive.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::compatibility::{calculate_compatibility, CompatibilityRecord, CompatibilityWeights};
use crate::config::MatchingConfig;
use crate::db::models::Collection;
use crate::db::records;
use crate::db::DocumentStore;
use crate::error::{MatchError, Result};
use crate::profile::service::ProfileService;
use crate::profile::TasteProfile;

/// A participant whose profile could not be acquired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileError {
    #[serde(alias = "userCode")]
    pub identity: String,
    /// Machine-readable error code (see `MatchError::code`)
    #[serde(default)]
    pub kind: String,
    /// Human-readable message
    pub error: String,
}

impl ProfileError {
    pub fn new(identity: &str, error: &MatchError) -> Self {
        Self {
            identity: identity.to_string(),
            kind: error.code().to_string(),
            error: error.to_string(),
        }
    }
}

/// The full, ranked match set for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMatchSet {
    pub session_id: String,
    /// Sorted by overall score, best first
    pub matches: Vec<CompatibilityRecord>,
    pub computed_at: DateTime<Utc>,
    pub profile_errors: Vec<ProfileError>,
    pub participant_count: usize,
    pub profiles_loaded: usize,
}

/// What `get_session_matches` found on the session record.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredMatches {
    Computed(SessionMatchSet),
    NotComputed,
}

impl StoredMatches {
    pub fn matches(&self) -> &[CompatibilityRecord] {
        match self {
            StoredMatches::Computed(set) => &set.matches,
            StoredMatches::NotComputed => &[],
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            StoredMatches::Computed(_) => "matched",
            StoredMatches::NotComputed => "not computed",
        }
    }
}

pub struct SessionMatcher {
    store: Arc<dyn DocumentStore>,
    profiles: Arc<ProfileService>,
    weights: CompatibilityWeights,
    concurrency: usize,
    /// One lock per session id, so recomputations of a session don't interleave
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionMatcher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        profiles: Arc<ProfileService>,
        config: &MatchingConfig,
    ) -> Self {
        Self {
            store,
            profiles,
            weights: config.weights.clone(),
            concurrency: config.concurrency.max(1),
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Compute, store and return the match set for a session.
    ///
    /// `force_refresh` rebuilds every participant's profile regardless of
    /// cache freshness.
    pub async fn compute_matches(&self, session_id: &str, force_refresh: bool) -> Result<SessionMatchSet> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;

        let session = records::load_session(self.store.as_ref(), session_id)
            .await?
            .ok_or_else(|| MatchError::SessionNotFound(session_id.to_string()))?;

        let identities = session.participant_identities();
        if identities.len() < 2 {
            return Err(MatchError::InsufficientParticipants {
                found: identities.len(),
            });
        }

        info!(
            session = session_id,
            participants = identities.len(),
            "Computing matches"
        );

        let (profiles, profile_errors) = self.acquire_profiles(&identities, force_refresh).await;

        if profiles.len() < 2 {
            warn!(
                session = session_id,
                loaded = profiles.len(),
                failed = profile_errors.len(),
                "Not enough profiles to match"
            );
            return Err(MatchError::InsufficientProfiles {
                built: profiles.len(),
            });
        }

        let matches = pairwise_matches(&profiles, &self.weights);

        info!(
            session = session_id,
            matches = matches.len(),
            best = matches.first().map(|m| m.scores.overall).unwrap_or(0.0),
            "Calculated matches"
        );

        let match_set = SessionMatchSet {
            session_id: session_id.to_string(),
            matches,
            computed_at: Utc::now(),
            profile_errors,
            participant_count: identities.len(),
            profiles_loaded: profiles.len(),
        };

        self.persist(&match_set).await?;
        Ok(match_set)
    }

    /// Read the stored match set for a session without computing anything.
    pub async fn get_session_matches(&self, session_id: &str) -> Result<StoredMatches> {
        let session = records::load_session(self.store.as_ref(), session_id)
            .await?
            .ok_or_else(|| MatchError::SessionNotFound(session_id.to_string()))?;

        let Some(mut matches) = session.matches.clone() else {
            return Ok(StoredMatches::NotComputed);
        };
        sort_matches(&mut matches);

        let participant_count = session.participant_identities().len();
        Ok(StoredMatches::Computed(SessionMatchSet {
            session_id: session.code,
            matches,
            computed_at: session
                .matching_completed_at
                .or(session.updated_at)
                .unwrap_or_default(),
            profile_errors: session.profile_errors,
            participant_count,
            profiles_loaded: session
                .profiles_loaded
                .unwrap_or(participant_count),
        }))
    }

    /// Compatibility between two users, using cached profiles where fresh.
    pub async fn compare(&self, identity_a: &str, identity_b: &str) -> Result<CompatibilityRecord> {
        let a = self.profiles.get_or_build(identity_a, false).await?;
        let b = self.profiles.get_or_build(identity_b, false).await?;
        calculate_compatibility(&a, &b, &self.weights)
    }

    /// Acquire every participant's profile, keeping participant order.
    ///
    /// Each acquisition settles independently; failures are collected
    /// rather than aborting the rest.
    async fn acquire_profiles(
        &self,
        identities: &[String],
        force_refresh: bool,
    ) -> (Vec<TasteProfile>, Vec<ProfileError>) {
        let results: Vec<(&String, Result<TasteProfile>)> =
            stream::iter(identities.iter().map(|identity| async move {
                let result = self.profiles.get_or_build(identity, force_refresh).await;
                (identity, result)
            }))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut profiles = Vec::new();
        let mut errors = Vec::new();
        for (identity, result) in results {
            match result {
                Ok(profile) => profiles.push(profile),
                Err(e) => {
                    warn!(
                        identity = identity.as_str(),
                        kind = e.code(),
                        error = %e,
                        "Failed to get profile, skipping participant"
                    );
                    errors.push(ProfileError::new(identity, &e));
                }
            }
        }

        (profiles, errors)
    }

    async fn persist(&self, match_set: &SessionMatchSet) -> Result<()> {
        let fields = json!({
            "matches": match_set.matches,
            "matchingCompletedAt": match_set.computed_at,
            "profileErrors": match_set.profile_errors,
            "profilesLoaded": match_set.profiles_loaded,
            "status": "matched",
            "updatedAt": Utc::now(),
        });

        let updated = self
            .store
            .update_fields(Collection::Sessions, &match_set.session_id, &fields)
            .await?;
        if !updated {
            return Err(MatchError::SessionNotFound(match_set.session_id.clone()));
        }
        Ok(())
    }

    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        // Drop locks nobody is holding or waiting on
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

/// Score every unordered pair (i < j, in profile order) and rank the results.
///
/// A pair that fails to score is logged and left out.
pub fn pairwise_matches(
    profiles: &[TasteProfile],
    weights: &CompatibilityWeights,
) -> Vec<CompatibilityRecord> {
    let mut matches = Vec::new();

    for (i, a) in profiles.iter().enumerate() {
        for b in &profiles[i + 1..] {
            match calculate_compatibility(a, b, weights) {
                Ok(record) => matches.push(record),
                Err(e) => {
                    warn!(
                        a = a.identity.as_str(),
                        b = b.identity.as_str(),
                        error = %e,
                        "Failed to score pair, skipping"
                    );
                }
            }
        }
    }

    sort_matches(&mut matches);
    matches
}

/// Sort by overall score, best first. The sort is stable, so equal scores
/// keep generation order.
pub fn sort_matches(matches: &mut [CompatibilityRecord]) {
    matches.sort_by(|a, b| {
        b.scores
            .overall
            .partial_cmp(&a.scores.overall)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
