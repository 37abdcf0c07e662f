// Listening-history source trait — swap-ready abstraction.
//
// The profile builder only needs ranked top artists and top tracks with play
// counts. LastfmClient is the production implementation; tests plug in a
// fixed in-memory source.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One ranked artist from a user's listening history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopArtist {
    pub name: String,
    pub playcount: u64,
}

/// One ranked track from a user's listening history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTrack {
    pub artist_name: String,
    pub track_name: String,
    pub playcount: u64,
}

/// Aggregation window for top-artist/top-track charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Period {
    #[default]
    Overall,
    SevenDay,
    OneMonth,
    ThreeMonth,
    SixMonth,
    TwelveMonth,
}

impl Period {
    /// The value Last.fm expects in the `period` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Overall => "overall",
            Period::SevenDay => "7day",
            Period::OneMonth => "1month",
            Period::ThreeMonth => "3month",
            Period::SixMonth => "6month",
            Period::TwelveMonth => "12month",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overall" => Ok(Period::Overall),
            "7day" => Ok(Period::SevenDay),
            "1month" => Ok(Period::OneMonth),
            "3month" => Ok(Period::ThreeMonth),
            "6month" => Ok(Period::SixMonth),
            "12month" => Ok(Period::TwelveMonth),
            other => Err(format!("unknown period \"{other}\"")),
        }
    }
}

/// Trait for fetching a user's ranked listening history.
///
/// Failures must be classified into the `Upstream*` variants of
/// `MatchError` so callers can tell a missing account from a flaky network.
#[async_trait]
pub trait ListeningHistorySource: Send + Sync {
    /// Fetch up to `limit` top artists for `username` over `period`.
    async fn top_artists(&self, username: &str, period: Period, limit: u32)
        -> Result<Vec<TopArtist>>;

    /// Fetch up to `limit` top tracks for `username` over `period`.
    async fn top_tracks(&self, username: &str, period: Period, limit: u32) -> Result<Vec<TopTrack>>;
}
