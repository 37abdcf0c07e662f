// Taste profiles — a user's listening history as a pair of weighted vectors.
//
// Keys are case-folded and trimmed; each listed artist or track gets weight
// ln(playcount + 1), which compresses heavy-tailed play counts while keeping
// rank order.

pub mod builder;
pub mod cache;
pub mod service;

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};
use crate::lastfm::traits::{TopArtist, TopTrack};
use crate::similarity::TasteVector;

/// Data source tag recorded in profile metadata.
pub const DATA_SOURCE_LASTFM: &str = "lastfm";

/// A complete taste profile for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasteProfile {
    pub identity: String,
    pub display_name: String,
    pub source_username: String,
    /// Normalized artist name -> weight
    pub artist_vector: TasteVector,
    /// Normalized "artist - track" -> weight
    pub track_vector: TasteVector,
    pub metadata: ProfileMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetadata {
    /// Number of artists the source returned
    pub total_artists: usize,
    /// Number of tracks the source returned
    pub total_tracks: usize,
    pub created_at: DateTime<Utc>,
    pub data_source: String,
}

impl TasteProfile {
    /// Build a profile from raw listening history.
    pub fn from_history(
        identity: &str,
        display_name: &str,
        source_username: &str,
        artists: &[TopArtist],
        tracks: &[TopTrack],
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            source_username: source_username.to_string(),
            artist_vector: artist_vector(artists),
            track_vector: track_vector(tracks),
            metadata: ProfileMetadata {
                total_artists: artists.len(),
                total_tracks: tracks.len(),
                created_at,
                data_source: DATA_SOURCE_LASTFM.to_string(),
            },
        }
    }

    /// Check both vectors for empty keys and non-finite or non-positive weights.
    pub fn validate(&self) -> Result<()> {
        self.artist_vector
            .validate()
            .map_err(|e| MatchError::MalformedProfile(format!("{}: artist vector {e}", self.identity)))?;
        self.track_vector
            .validate()
            .map_err(|e| MatchError::MalformedProfile(format!("{}: track vector {e}", self.identity)))?;
        Ok(())
    }

    /// Display the profile's strongest artists as a bar chart in the terminal.
    pub fn display(&self, top_n: usize) {
        println!(
            "\n{}",
            format!(
                "=== Taste profile: {} (last.fm: {}) ===",
                self.display_name, self.source_username
            )
            .bold()
        );
        println!(
            "  {} artists, {} tracks, built {}",
            self.metadata.total_artists,
            self.metadata.total_tracks,
            self.metadata.created_at.format("%Y-%m-%d %H:%M UTC")
        );
        println!();

        let max_weight = self
            .artist_vector
            .iter()
            .map(|(_, w)| w)
            .fold(0.0_f64, f64::max);
        let bar_width: usize = 20;

        for (i, (artist, weight)) in self.artist_vector.iter().take(top_n).enumerate() {
            let share = if max_weight > 0.0 { weight / max_weight } else { 0.0 };
            let filled = (share * bar_width as f64).round() as usize;
            let bar = format!(
                "[{}{}]",
                "=".repeat(filled),
                " ".repeat(bar_width.saturating_sub(filled))
            );

            let colored_bar = if share >= 0.75 {
                bar.bright_green()
            } else if share >= 0.5 {
                bar.bright_yellow()
            } else {
                bar.bright_blue()
            };

            println!("  {:>2}. {:<36} {} {:.2}", i + 1, artist.bold(), colored_bar, weight);
        }

        if self.artist_vector.is_empty() {
            println!("  {}", "No listening history yet.".dimmed());
        }
        println!();
    }
}

/// Case-fold and trim an artist or track name.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Vector key for a track: `"artist - title"`, both parts normalized.
pub fn track_key(artist: &str, title: &str) -> String {
    format!("{} - {}", normalize_key(artist), normalize_key(title))
}

/// Log-compressed listening weight. A missing or zero play count counts as one play.
pub fn play_weight(playcount: u64) -> f64 {
    (playcount.max(1) as f64).ln_1p()
}

/// Build the artist vector. Blank names are skipped; a repeated name keeps
/// its first position and takes the later weight.
pub fn artist_vector(artists: &[TopArtist]) -> TasteVector {
    let mut vector = TasteVector::new();
    for artist in artists {
        let key = normalize_key(&artist.name);
        if key.is_empty() {
            continue;
        }
        vector.insert(key, play_weight(artist.playcount));
    }
    vector
}

/// Build the track vector. Tracks with a blank artist or title are skipped.
pub fn track_vector(tracks: &[TopTrack]) -> TasteVector {
    let mut vector = TasteVector::new();
    for track in tracks {
        if track.artist_name.trim().is_empty() || track.track_name.trim().is_empty() {
            continue;
        }
        vector.insert(
            track_key(&track.artist_name, &track.track_name),
            play_weight(track.playcount),
        );
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(name: &str, playcount: u64) -> TopArtist {
        TopArtist {
            name: name.to_string(),
            playcount,
        }
    }

    #[test]
    fn test_play_weight() {
        assert!((play_weight(50) - 51.0_f64.ln()).abs() < 1e-12);
        // Zero is floored to one play
        assert!((play_weight(0) - 2.0_f64.ln()).abs() < 1e-12);
        assert!(play_weight(0) > 0.0);
    }

    #[test]
    fn test_keys_are_normalized() {
        let v = artist_vector(&[artist("  Radiohead ", 50), artist("MUSE", 20)]);
        assert_eq!(v.keys().collect::<Vec<_>>(), vec!["radiohead", "muse"]);
        assert_eq!(track_key(" Radiohead", "Karma Police "), "radiohead - karma police");
    }

    #[test]
    fn test_blank_entries_are_skipped() {
        let v = artist_vector(&[artist("   ", 10), artist("Air", 3)]);
        assert_eq!(v.len(), 1);

        let tracks = vec![
            TopTrack {
                artist_name: "".to_string(),
                track_name: "Untitled".to_string(),
                playcount: 4,
            },
            TopTrack {
                artist_name: "Air".to_string(),
                track_name: "La femme d'argent".to_string(),
                playcount: 4,
            },
        ];
        let v = track_vector(&tracks);
        assert_eq!(v.keys().collect::<Vec<_>>(), vec!["air - la femme d'argent"]);
    }

    #[test]
    fn test_duplicate_names_collapse() {
        let v = artist_vector(&[artist("Air", 3), artist("Muse", 5), artist("AIR", 9)]);
        assert_eq!(v.keys().collect::<Vec<_>>(), vec!["air", "muse"]);
        assert!((v.weight("air") - 10.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let mut profile = TasteProfile::from_history("U1", "Ana", "ana", &[artist("Air", 3)], &[], Utc::now());
        assert!(profile.validate().is_ok());

        profile.artist_vector = serde_json::from_str(r#"{"air": -1.0}"#).unwrap();
        assert!(matches!(profile.validate(), Err(MatchError::MalformedProfile(_))));
    }

    #[test]
    fn test_profile_serializes_camel_case() {
        let profile = TasteProfile::from_history("U1", "Ana", "ana", &[artist("Air", 3)], &[], Utc::now());
        let value = serde_json::to_value(&profile).unwrap();
        assert!(value.get("artistVector").is_some());
        assert_eq!(value["metadata"]["dataSource"], "lastfm");
        assert_eq!(value["metadata"]["totalArtists"], 1);
    }
}
