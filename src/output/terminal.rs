// Colored terminal output for match sets and pairwise comparisons.
//
// This module handles all terminal-specific formatting: colors, tables,
// score bands. The command handlers in main.rs delegate here.

use colored::Colorize;

use crate::matching::{CompatibilityRecord, ProfileError, SessionMatchSet, StoredMatches};

/// Display a session's ranked match list in the terminal.
pub fn display_match_set(match_set: &SessionMatchSet) {
    println!(
        "\n{}",
        format!(
            "=== Matches for session {} ({} pairs) ===",
            match_set.session_id,
            match_set.matches.len()
        )
        .bold()
    );
    println!(
        "  {} of {} participants profiled, computed {}",
        match_set.profiles_loaded,
        match_set.participant_count,
        match_set.computed_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!();

    if match_set.matches.is_empty() {
        println!("  {}", "No pairs could be scored.".dimmed());
    } else {
        // Header
        println!(
            "  {:>4}  {:<24} {:<24} {:>7}  {:>6}  {:>6}  {:>6}",
            "Rank".dimmed(),
            "User A".dimmed(),
            "User B".dimmed(),
            "Overall".dimmed(),
            "Artist".dimmed(),
            "Track".dimmed(),
            "Shared".dimmed(),
        );
        println!("  {}", "-".repeat(88).dimmed());

        for (i, record) in match_set.matches.iter().enumerate() {
            println!(
                "  {:>4}. {:<24} {:<24} {:>7}  {:>6.2}  {:>6.2}  {:>6}",
                i + 1,
                super::truncate_chars(&record.user_a.display_name, 21),
                super::truncate_chars(&record.user_b.display_name, 21),
                colorize_score(record.scores.overall),
                record.scores.artist,
                record.scores.track,
                record.common_elements.artist_count,
            );
        }
    }

    display_profile_errors(&match_set.profile_errors);
    println!();
}

/// Display whatever is stored on a session, computed or not.
pub fn display_stored_matches(session_id: &str, stored: &StoredMatches) {
    match stored {
        StoredMatches::Computed(match_set) => display_match_set(match_set),
        StoredMatches::NotComputed => {
            println!("No matches computed yet for session {session_id}.");
            println!("  Run `tastematch match {session_id}` to compute them.");
        }
    }
}

/// Display a single pairwise comparison in detail.
pub fn display_compatibility(record: &CompatibilityRecord) {
    println!(
        "\n{}",
        format!(
            "=== {} vs {} ===",
            record.user_a.display_name, record.user_b.display_name
        )
        .bold()
    );
    println!(
        "  Overall compatibility: {} ({})",
        colorize_score(record.scores.overall),
        score_band(record.scores.overall)
    );
    println!(
        "  Artist similarity: {:.2}  (Jaccard {:.2})",
        record.scores.artist, record.scores.artist_jaccard
    );
    println!(
        "  Track similarity:  {:.2}  (Jaccard {:.2})",
        record.scores.track, record.scores.track_jaccard
    );

    let common = &record.common_elements;
    if common.artists.is_empty() {
        println!("\n  {}", "No artists in common.".dimmed());
    } else {
        println!("\n  {} artists in common:", common.artist_count);
        for artist in &common.artists {
            println!("    {}", artist);
        }
        if common.artist_count > common.artists.len() {
            println!(
                "    {}",
                format!("...and {} more", common.artist_count - common.artists.len()).dimmed()
            );
        }
    }

    if !common.tracks.is_empty() {
        println!("\n  {} tracks in common:", common.track_count);
        for track in &common.tracks {
            println!("    {}", track);
        }
    }
    println!();
}

/// Display participants that had to be left out of matching.
pub fn display_profile_errors(errors: &[ProfileError]) {
    if errors.is_empty() {
        return;
    }

    println!();
    println!(
        "  {} {} participant(s) skipped:",
        "!".yellow().bold(),
        errors.len()
    );
    for error in errors {
        println!(
            "    {:<12} {} {}",
            error.identity,
            format!("[{}]", error.kind).yellow(),
            error.error.dimmed()
        );
    }
}

/// Human-readable band for an overall score.
pub fn score_band(score: f64) -> &'static str {
    if score >= 0.75 {
        "strong"
    } else if score >= 0.5 {
        "good"
    } else if score >= 0.25 {
        "some"
    } else {
        "little"
    }
}

/// Colorize a score by its band.
fn colorize_score(score: f64) -> colored::ColoredString {
    let text = format!("{score:.2}");
    match score_band(score) {
        "strong" => text.bright_green().bold(),
        "good" => text.green(),
        "some" => text.yellow(),
        _ => text.dimmed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bands() {
        assert_eq!(score_band(0.95), "strong");
        assert_eq!(score_band(0.75), "strong");
        assert_eq!(score_band(0.6), "good");
        assert_eq!(score_band(0.3), "some");
        assert_eq!(score_band(0.0), "little");
    }
}
