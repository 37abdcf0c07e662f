// System status display — shows DB stats, cached profiles, session state.

use anyhow::Result;
use chrono::{Duration, Utc};
use std::path::Path;
use std::sync::Arc;

use crate::db::models::Collection;
use crate::db::records;
use crate::db::DocumentStore;
use crate::profile::cache::ProfileCache;

/// Display system status to the terminal.
pub async fn show(store: &Arc<dyn DocumentStore>, db_display_path: &str, freshness: Duration) -> Result<()> {
    // Database file size
    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_display_path, file_size);

    // Users and how many have a fresh cached profile
    let cache = ProfileCache::new(Arc::clone(store), freshness);
    let user_ids = store.list_ids(Collection::Users).await?;
    let now = Utc::now();
    let mut linked = 0;
    let mut fresh = 0;
    for id in &user_ids {
        if let Some(user) = records::load_user(store.as_ref(), id).await? {
            if user.source_username().is_some() {
                linked += 1;
            }
            if cache.fresh_from_user(&user, now).is_some() {
                fresh += 1;
            }
        }
    }
    println!(
        "Users: {} total, {} with Last.fm linked, {} fresh profiles",
        user_ids.len(),
        linked,
        fresh
    );
    if user_ids.is_empty() {
        println!("  Run `tastematch user add <name> --lastfm <username>` to add one");
    }

    // Sessions
    let session_ids = store.list_ids(Collection::Sessions).await?;
    let mut matched = Vec::new();
    for id in &session_ids {
        if let Some(session) = records::load_session(store.as_ref(), id).await? {
            if let Some(completed) = session.matching_completed_at {
                matched.push((session.code, completed));
            }
        }
    }
    println!(
        "Sessions: {} total, {} matched",
        session_ids.len(),
        matched.len()
    );

    matched.sort_by(|a, b| b.1.cmp(&a.1));
    if let Some((code, completed)) = matched.first() {
        println!("Last match run: session {} ({})", code, completed);
    }

    Ok(())
}

/// True if the database file exists at `db_path`.
pub fn is_initialized(db_path: &str) -> bool {
    Path::new(db_path).exists()
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
