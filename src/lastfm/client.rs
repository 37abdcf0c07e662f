// Last.fm API client — user.gettopartists / user.gettoptracks over HTTP.
//
// A thin reqwest wrapper with one generic GET helper. Every request is paced
// by the rate limiter and bounded by the client timeout. Failures are
// classified from Last.fm's numeric error codes (which may arrive with a 200
// status) and, failing that, from the HTTP status.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use super::rate_limiter::RateLimiter;
use super::traits::{ListeningHistorySource, Period, TopArtist, TopTrack};
use crate::error::{MatchError, Result};

/// Default Last.fm API endpoint.
pub const DEFAULT_API_URL: &str = "https://ws.audioscrobbler.com";

/// HTTP client for the Last.fm web service.
pub struct LastfmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: RateLimiter,
}

impl LastfmClient {
    /// Create a client for `base_url`.
    ///
    /// `timeout` bounds each request end to end; `requests_per_second`
    /// paces requests across all concurrent callers sharing this client.
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        requests_per_second: f64,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("tastematch/0.1 (taste-profile matching)")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            limiter: RateLimiter::new(requests_per_second),
        })
    }

    /// Call a `user.*` chart method and deserialize the response.
    async fn chart<T: DeserializeOwned>(
        &self,
        method: &str,
        username: &str,
        period: Period,
        limit: u32,
    ) -> Result<T> {
        if self.api_key.is_empty() {
            return Err(MatchError::UpstreamCredentialsMissing(
                "LASTFM_API_KEY not set".to_string(),
            ));
        }

        self.limiter.acquire().await;

        let url = format!("{}/2.0/", self.base_url);
        let limit = limit.to_string();

        debug!(method = method, user = username, period = %period, "Last.fm request");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("method", method),
                ("user", username),
                ("period", period.as_str()),
                ("limit", limit.as_str()),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| transport_error(method, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(method, e))?;

        // Last.fm reports most failures in the body, sometimes with a 200.
        if let Ok(api_error) = serde_json::from_str::<ApiErrorBody>(&body) {
            return Err(classify_api_error(api_error.error, &api_error.message, username));
        }

        if !status.is_success() {
            return Err(classify_status(status, username));
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            MatchError::UpstreamTransient(format!("unexpected {method} response: {e}"))
        })
    }
}

#[async_trait]
impl ListeningHistorySource for LastfmClient {
    async fn top_artists(
        &self,
        username: &str,
        period: Period,
        limit: u32,
    ) -> Result<Vec<TopArtist>> {
        let response: TopArtistsResponse = self
            .chart("user.gettopartists", username, period, limit)
            .await?;
        let chart = response
            .topartists
            .ok_or_else(|| MatchError::UpstreamNoHistory(username.to_string()))?;
        Ok(chart.artist.into_vec().into_iter().map(Into::into).collect())
    }

    async fn top_tracks(&self, username: &str, period: Period, limit: u32) -> Result<Vec<TopTrack>> {
        let response: TopTracksResponse = self
            .chart("user.gettoptracks", username, period, limit)
            .await?;
        let chart = response
            .toptracks
            .ok_or_else(|| MatchError::UpstreamNoHistory(username.to_string()))?;
        Ok(chart.track.into_vec().into_iter().map(Into::into).collect())
    }
}

fn transport_error(method: &str, e: reqwest::Error) -> MatchError {
    // Strip the URL: its query string carries the API key.
    let e = e.without_url();
    if e.is_timeout() {
        MatchError::UpstreamTransient(format!("{method} timed out"))
    } else {
        MatchError::UpstreamTransient(format!("{method} request failed: {e}"))
    }
}

/// Map a Last.fm error code to a classified error.
///
/// Codes: 6 invalid parameters (unknown user), 10 invalid API key,
/// 17 login required (private profile), 26 suspended API key,
/// 8/11/16 backend trouble, 29 rate limit exceeded.
pub fn classify_api_error(code: i64, message: &str, username: &str) -> MatchError {
    match code {
        6 => MatchError::UpstreamNotFound(username.to_string()),
        10 | 26 => MatchError::UpstreamCredentialsMissing(message.to_string()),
        17 => MatchError::UpstreamForbidden(username.to_string()),
        _ => MatchError::UpstreamTransient(format!("Last.fm error {code}: {message}")),
    }
}

/// Map an HTTP status without a Last.fm error body to a classified error.
pub fn classify_status(status: StatusCode, username: &str) -> MatchError {
    match status {
        StatusCode::NOT_FOUND => MatchError::UpstreamNotFound(username.to_string()),
        StatusCode::UNAUTHORIZED => {
            MatchError::UpstreamCredentialsMissing(format!("Last.fm returned {status}"))
        }
        StatusCode::FORBIDDEN => MatchError::UpstreamForbidden(username.to_string()),
        _ => MatchError::UpstreamTransient(format!("Last.fm returned {status}")),
    }
}

// -- Serde types for the Last.fm JSON API --

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: i64,
    #[serde(default)]
    message: String,
}

/// Response from `user.gettopartists`.
#[derive(Debug, Deserialize)]
pub struct TopArtistsResponse {
    pub topartists: Option<ArtistChart>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistChart {
    #[serde(default)]
    pub artist: OneOrMany<ChartArtist>,
}

#[derive(Debug, Deserialize)]
pub struct ChartArtist {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_playcount")]
    pub playcount: u64,
}

/// Response from `user.gettoptracks`.
#[derive(Debug, Deserialize)]
pub struct TopTracksResponse {
    pub toptracks: Option<TrackChart>,
}

#[derive(Debug, Deserialize)]
pub struct TrackChart {
    #[serde(default)]
    pub track: OneOrMany<ChartTrack>,
}

#[derive(Debug, Deserialize)]
pub struct ChartTrack {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_playcount")]
    pub playcount: u64,
    pub artist: ChartTrackArtist,
}

#[derive(Debug, Deserialize)]
pub struct ChartTrackArtist {
    #[serde(alias = "#text")]
    pub name: String,
}

/// Last.fm collapses a one-element list into a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

impl From<ChartArtist> for TopArtist {
    fn from(a: ChartArtist) -> Self {
        TopArtist {
            name: a.name,
            playcount: a.playcount,
        }
    }
}

impl From<ChartTrack> for TopTrack {
    fn from(t: ChartTrack) -> Self {
        TopTrack {
            artist_name: t.artist.name,
            track_name: t.name,
            playcount: t.playcount,
        }
    }
}

/// Play counts come back as strings ("123"); accept numbers too.
/// Anything unparseable becomes 0 and is floored later by the profile builder.
fn deserialize_playcount<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}
