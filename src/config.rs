use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

use crate::matching::compatibility::CompatibilityWeights;
use crate::profile::builder::ProfileConfig;
use crate::profile::cache::DEFAULT_FRESHNESS_HOURS;

/// Tunables for profile building and matching.
///
/// Passed explicitly into ProfileService and SessionMatcher at construction.
/// Defaults: 50 artists and 100 tracks over the overall period, a 24-hour
/// freshness window, 0.7/0.3 weighting.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    pub profile: ProfileConfig,
    /// Maximum age of a cached profile before it is rebuilt
    pub freshness: chrono::Duration,
    pub weights: CompatibilityWeights,
    /// Profiles acquired in parallel per session (default 4)
    pub concurrency: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            profile: ProfileConfig::default(),
            freshness: chrono::Duration::hours(DEFAULT_FRESHNESS_HOURS),
            weights: CompatibilityWeights::default(),
            concurrency: 4,
        }
    }
}

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
pub struct Config {
    pub lastfm_api_key: String,
    /// Last.fm API endpoint (defaults to https://ws.audioscrobbler.com)
    pub lastfm_api_url: String,
    pub db_path: String,
    /// Per-request timeout for Last.fm calls
    pub request_timeout: Duration,
    /// Request pacing for Last.fm calls
    pub requests_per_second: f64,
    pub matching: MatchingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the Last.fm API key, which is only
    /// needed by commands that build profiles.
    pub fn load() -> Result<Self> {
        let defaults = MatchingConfig::default();

        let period = env_parse("TASTEMATCH_PERIOD", defaults.profile.period);
        let artist_limit = env_parse("TASTEMATCH_ARTIST_LIMIT", defaults.profile.artist_limit);
        let track_limit = env_parse("TASTEMATCH_TRACK_LIMIT", defaults.profile.track_limit);
        let freshness_hours = env_parse("TASTEMATCH_FRESHNESS_HOURS", DEFAULT_FRESHNESS_HOURS);
        let concurrency = env_parse("TASTEMATCH_CONCURRENCY", defaults.concurrency).max(1);

        Ok(Self {
            lastfm_api_key: env::var("LASTFM_API_KEY").unwrap_or_default(),
            lastfm_api_url: env::var("LASTFM_API_URL")
                .unwrap_or_else(|_| crate::lastfm::client::DEFAULT_API_URL.to_string()),
            db_path: env::var("TASTEMATCH_DB_PATH")
                .unwrap_or_else(|_| "./tastematch.db".to_string()),
            request_timeout: Duration::from_secs(env_parse("TASTEMATCH_TIMEOUT_SECS", 10u64)),
            requests_per_second: env_parse("TASTEMATCH_REQUESTS_PER_SECOND", 5.0f64),
            matching: MatchingConfig {
                profile: ProfileConfig {
                    artist_limit,
                    track_limit,
                    period,
                },
                freshness: freshness_window(freshness_hours, defaults.freshness),
                weights: defaults.weights,
                concurrency,
            },
        })
    }

    /// Check that the Last.fm API key is configured.
    /// Call this before any operation that may build a profile.
    pub fn require_lastfm(&self) -> Result<()> {
        if self.lastfm_api_key.is_empty() {
            anyhow::bail!(
                "LASTFM_API_KEY not set. Add it to your .env file.\n\
                 Get a key at https://www.last.fm/api/account/create"
            );
        }
        Ok(())
    }
}

/// Freshness window for `hours`, falling back to `default` when the value
/// is negative or too large to represent.
fn freshness_window(hours: i64, default: chrono::Duration) -> chrono::Duration {
    match chrono::Duration::try_hours(hours) {
        Some(window) if hours >= 0 => window,
        _ => {
            warn!(hours = hours, "Freshness window out of range, using default");
            default
        }
    }
}

/// Read and parse an env var, falling back to `default` when unset or invalid.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key = key, value = %raw, "Ignoring unparseable setting, using default");
                default
            }
        },
        Err(_) => default,
    }
}
