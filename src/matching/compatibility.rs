// Compatibility score for a pair of taste profiles.
//
// The overall score is 70% artist similarity and 30% track similarity, both
// cosine over the weighted vectors. Individual tracks are a sparser, noisier
// signal than artists, so they count for less. Jaccard scores over the key
// sets ride along for diagnostics and do not feed the overall score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::profile::TasteProfile;
use crate::similarity::{cosine_similarity, key_jaccard, TasteVector};

/// Configurable weights for the compatibility formula.
///
/// `overall = artist * artist_weight + track * track_weight`
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibilityWeights {
    /// Weight of artist cosine similarity (default 0.7)
    pub artist_weight: f64,
    /// Weight of track cosine similarity (default 0.3)
    pub track_weight: f64,
    /// How many shared artists/tracks to list by name (default 10)
    pub common_element_cap: usize,
}

impl Default for CompatibilityWeights {
    fn default() -> Self {
        Self {
            artist_weight: 0.7,
            track_weight: 0.3,
            common_element_cap: 10,
        }
    }
}

/// The scored comparison of two profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityRecord {
    /// Identities of the two participants, in generation order
    #[serde(alias = "pair")]
    pub pair_identities: [String; 2],
    pub user_a: ParticipantSummary,
    pub user_b: ParticipantSummary,
    pub scores: Scores,
    pub common_elements: CommonElements,
    pub calculated_at: DateTime<Utc>,
    /// Data source of each profile
    pub data_sources: [String; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub identity: String,
    pub display_name: String,
}

/// All scores are rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub artist: f64,
    pub track: f64,
    pub overall: f64,
    pub artist_jaccard: f64,
    pub track_jaccard: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonElements {
    /// Shared artists in profile A's order, capped
    pub artists: Vec<String>,
    /// Shared tracks in profile A's order, capped
    pub tracks: Vec<String>,
    pub artist_count: usize,
    pub track_count: usize,
}

/// Compute the compatibility record for two profiles.
///
/// Fails with `MalformedProfile` if either profile holds invalid weights.
pub fn calculate_compatibility(
    a: &TasteProfile,
    b: &TasteProfile,
    weights: &CompatibilityWeights,
) -> Result<CompatibilityRecord> {
    a.validate()?;
    b.validate()?;

    let artist = cosine_similarity(&a.artist_vector, &b.artist_vector);
    let track = cosine_similarity(&a.track_vector, &b.track_vector);
    let overall = (artist * weights.artist_weight + track * weights.track_weight).clamp(0.0, 1.0);

    let common_artists = common_keys(&a.artist_vector, &b.artist_vector);
    let common_tracks = common_keys(&a.track_vector, &b.track_vector);

    Ok(CompatibilityRecord {
        pair_identities: [a.identity.clone(), b.identity.clone()],
        user_a: ParticipantSummary {
            identity: a.identity.clone(),
            display_name: a.display_name.clone(),
        },
        user_b: ParticipantSummary {
            identity: b.identity.clone(),
            display_name: b.display_name.clone(),
        },
        scores: Scores {
            artist: round2(artist),
            track: round2(track),
            overall: round2(overall),
            artist_jaccard: round2(key_jaccard(&a.artist_vector, &b.artist_vector)),
            track_jaccard: round2(key_jaccard(&a.track_vector, &b.track_vector)),
        },
        common_elements: CommonElements {
            artist_count: common_artists.len(),
            track_count: common_tracks.len(),
            artists: common_artists
                .into_iter()
                .take(weights.common_element_cap)
                .collect(),
            tracks: common_tracks
                .into_iter()
                .take(weights.common_element_cap)
                .collect(),
        },
        calculated_at: Utc::now(),
        data_sources: [
            a.metadata.data_source.clone(),
            b.metadata.data_source.clone(),
        ],
    })
}

/// Keys with positive weight in both vectors, in `a`'s order.
fn common_keys(a: &TasteVector, b: &TasteVector) -> Vec<String> {
    a.iter()
        .filter(|(key, weight)| *weight > 0.0 && b.weight(key) > 0.0)
        .map(|(key, _)| key.to_string())
        .collect()
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
