// Unit tests for profile building, caching and the profile service.
//
// A fixed in-memory listening-history source stands in for Last.fm, and
// the document store is in-memory SQLite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tastematch::config::MatchingConfig;
use tastematch::db::models::UserRecord;
use tastematch::db::records;
use tastematch::db::sqlite::SqliteStore;
use tastematch::db::DocumentStore;
use tastematch::error::{MatchError, Result};
use tastematch::lastfm::traits::{ListeningHistorySource, Period, TopArtist, TopTrack};
use tastematch::profile::builder::{ProfileBuilder, ProfileConfig};
use tastematch::profile::service::ProfileService;
use tastematch::profile::TasteProfile;

#[derive(Clone, Copy)]
enum Failure {
    NotFound,
    Forbidden,
}

#[derive(Default)]
struct FakeSource {
    artists: HashMap<String, Vec<TopArtist>>,
    tracks: HashMap<String, Vec<TopTrack>>,
    failures: HashMap<String, Failure>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, Period, u32)>>,
}

impl FakeSource {
    fn with_user(mut self, username: &str, artists: &[(&str, u64)], tracks: &[(&str, &str, u64)]) -> Self {
        self.artists.insert(
            username.to_string(),
            artists
                .iter()
                .map(|(name, playcount)| TopArtist {
                    name: name.to_string(),
                    playcount: *playcount,
                })
                .collect(),
        );
        self.tracks.insert(
            username.to_string(),
            tracks
                .iter()
                .map(|(artist, track, playcount)| TopTrack {
                    artist_name: artist.to_string(),
                    track_name: track.to_string(),
                    playcount: *playcount,
                })
                .collect(),
        );
        self
    }

    fn failing(mut self, username: &str, failure: Failure) -> Self {
        self.failures.insert(username.to_string(), failure);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, username: &str, period: Period, limit: u32) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((username.to_string(), period, limit));
        match self.failures.get(username) {
            Some(Failure::NotFound) => Err(MatchError::UpstreamNotFound(username.to_string())),
            Some(Failure::Forbidden) => Err(MatchError::UpstreamForbidden(username.to_string())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ListeningHistorySource for FakeSource {
    async fn top_artists(&self, username: &str, period: Period, limit: u32) -> Result<Vec<TopArtist>> {
        self.check(username, period, limit)?;
        self.artists
            .get(username)
            .cloned()
            .ok_or_else(|| MatchError::UpstreamNotFound(username.to_string()))
    }

    async fn top_tracks(&self, username: &str, period: Period, limit: u32) -> Result<Vec<TopTrack>> {
        self.check(username, period, limit)?;
        self.tracks
            .get(username)
            .cloned()
            .ok_or_else(|| MatchError::UpstreamNotFound(username.to_string()))
    }
}

fn ana_source() -> FakeSource {
    FakeSource::default().with_user(
        "ana_fm",
        &[("Radiohead", 50), ("Muse", 20), ("Air", 4)],
        &[("Radiohead", "Karma Police", 12), ("Air", "Playground Love", 3)],
    )
}

async fn store_with_users(users: &[UserRecord]) -> Arc<dyn DocumentStore> {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::in_memory().unwrap());
    for user in users {
        records::save_user(store.as_ref(), user).await.unwrap();
    }
    store
}

// ============================================================
// ProfileBuilder
// ============================================================

#[tokio::test]
async fn builder_vectorizes_history() {
    let builder = ProfileBuilder::new(Arc::new(ana_source()), ProfileConfig::default());
    let user = UserRecord::new("U1", "Ana", Some("ana_fm"));

    let profile = builder.build(&user).await.unwrap();

    assert_eq!(profile.identity, "U1");
    assert_eq!(profile.display_name, "Ana");
    assert_eq!(profile.source_username, "ana_fm");
    assert_eq!(
        profile.artist_vector.keys().collect::<Vec<_>>(),
        vec!["radiohead", "muse", "air"]
    );
    assert!((profile.artist_vector.weight("radiohead") - 51.0_f64.ln()).abs() < 1e-12);
    assert!(profile.track_vector.contains_key("radiohead - karma police"));
    assert_eq!(profile.metadata.total_artists, 3);
    assert_eq!(profile.metadata.total_tracks, 2);
    assert_eq!(profile.metadata.data_source, "lastfm");
}

#[tokio::test]
async fn builder_passes_configured_limits() {
    let source = Arc::new(ana_source());
    let config = ProfileConfig {
        artist_limit: 10,
        track_limit: 20,
        period: Period::ThreeMonth,
    };
    let builder = ProfileBuilder::new(source.clone(), config);
    builder
        .build(&UserRecord::new("U1", "Ana", Some("ana_fm")))
        .await
        .unwrap();

    let requests = source.requests.lock().unwrap().clone();
    assert_eq!(
        requests,
        vec![
            ("ana_fm".to_string(), Period::ThreeMonth, 10),
            ("ana_fm".to_string(), Period::ThreeMonth, 20),
        ]
    );
}

#[tokio::test]
async fn vectorization_ignores_listing_order() {
    let forward = FakeSource::default().with_user(
        "fm",
        &[("Radiohead", 50), ("Muse", 20), ("Air", 4)],
        &[("Radiohead", "Karma Police", 12), ("Air", "Playground Love", 3)],
    );
    let backward = FakeSource::default().with_user(
        "fm",
        &[("Air", 4), ("Muse", 20), ("Radiohead", 50)],
        &[("Air", "Playground Love", 3), ("Radiohead", "Karma Police", 12)],
    );

    let a = ProfileBuilder::new(Arc::new(forward), ProfileConfig::default())
        .build_for("U1", "Ana", "fm")
        .await
        .unwrap();
    let b = ProfileBuilder::new(Arc::new(backward), ProfileConfig::default())
        .build_for("U1", "Ana", "fm")
        .await
        .unwrap();

    assert_eq!(a.artist_vector, b.artist_vector);
    assert_eq!(a.track_vector, b.track_vector);
}

#[tokio::test]
async fn builder_requires_linked_account() {
    let source = Arc::new(ana_source());
    let builder = ProfileBuilder::new(source.clone(), ProfileConfig::default());

    let err = builder
        .build(&UserRecord::new("U2", "Bo", None))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::NoIdentitySource(id) if id == "U2"));

    let err = builder
        .build(&UserRecord::new("U3", "Cy", Some("  ")))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::NoIdentitySource(_)));

    assert_eq!(source.calls(), 0, "no source call without a username");
}

#[tokio::test]
async fn builder_propagates_source_errors_unchanged() {
    let source = FakeSource::default().failing("private_fm", Failure::Forbidden);
    let builder = ProfileBuilder::new(Arc::new(source), ProfileConfig::default());

    let err = builder
        .build(&UserRecord::new("U1", "Ana", Some("private_fm")))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::UpstreamForbidden(u) if u == "private_fm"));
}

// ============================================================
// ProfileService
// ============================================================

#[tokio::test]
async fn service_builds_once_then_serves_cache() {
    let store = store_with_users(&[UserRecord::new("U1", "Ana", Some("ana_fm"))]).await;
    let source = Arc::new(ana_source());
    let service = ProfileService::new(store.clone(), source.clone(), &MatchingConfig::default());

    assert!(service.cached("U1").await.unwrap().is_none());

    let built = service.get_or_build("U1", false).await.unwrap();
    assert_eq!(source.calls(), 2);

    let again = service.get_or_build("U1", false).await.unwrap();
    assert_eq!(source.calls(), 2, "fresh cache must not hit the source");
    assert_eq!(again.artist_vector, built.artist_vector);

    let cached = service.cached("U1").await.unwrap().unwrap();
    assert_eq!(cached.metadata, built.metadata);
}

#[tokio::test]
async fn cache_round_trip_keeps_listing_order() {
    let store = store_with_users(&[UserRecord::new("U1", "Ana", Some("ana_fm"))]).await;
    let service = ProfileService::new(store, Arc::new(ana_source()), &MatchingConfig::default());

    service.get_or_build("U1", false).await.unwrap();
    let cached = service.cached("U1").await.unwrap().unwrap();
    assert_eq!(
        cached.artist_vector.keys().collect::<Vec<_>>(),
        vec!["radiohead", "muse", "air"]
    );
}

#[tokio::test]
async fn force_refresh_always_rebuilds() {
    let store = store_with_users(&[UserRecord::new("U1", "Ana", Some("ana_fm"))]).await;
    let source = Arc::new(ana_source());
    let service = ProfileService::new(store, source.clone(), &MatchingConfig::default());

    service.get_or_build("U1", false).await.unwrap();
    service.get_or_build("U1", true).await.unwrap();
    assert_eq!(source.calls(), 4);
}

#[tokio::test]
async fn stale_cache_is_rebuilt() {
    let store = store_with_users(&[UserRecord::new("U1", "Ana", Some("ana_fm"))]).await;
    let source = Arc::new(ana_source());
    let service = ProfileService::new(store, source.clone(), &MatchingConfig::default());

    let old = TasteProfile::from_history(
        "U1",
        "Ana",
        "ana_fm",
        &[TopArtist {
            name: "Coldplay".to_string(),
            playcount: 9,
        }],
        &[],
        Utc::now() - Duration::hours(25),
    );
    service.cache().put("U1", &old).await.unwrap();
    assert!(service.cached("U1").await.unwrap().is_none());

    let profile = service.get_or_build("U1", false).await.unwrap();
    assert_eq!(source.calls(), 2);
    assert!(profile.artist_vector.contains_key("radiohead"));
    assert!(!profile.artist_vector.contains_key("coldplay"));
}

#[tokio::test]
async fn recent_cache_is_served() {
    let store = store_with_users(&[UserRecord::new("U1", "Ana", Some("ana_fm"))]).await;
    let source = Arc::new(ana_source());
    let service = ProfileService::new(store, source.clone(), &MatchingConfig::default());

    let recent = TasteProfile::from_history(
        "U1",
        "Ana",
        "ana_fm",
        &[TopArtist {
            name: "Coldplay".to_string(),
            playcount: 9,
        }],
        &[],
        Utc::now() - Duration::hours(23),
    );
    service.cache().put("U1", &recent).await.unwrap();

    let profile = service.get_or_build("U1", false).await.unwrap();
    assert_eq!(source.calls(), 0);
    assert!(profile.artist_vector.contains_key("coldplay"));
}

#[tokio::test]
async fn unknown_identity_is_reported() {
    let store = store_with_users(&[]).await;
    let service = ProfileService::new(store, Arc::new(ana_source()), &MatchingConfig::default());

    assert!(matches!(
        service.get_or_build("ghost", false).await,
        Err(MatchError::IdentityNotFound(id)) if id == "ghost"
    ));
    assert!(matches!(
        service.cached("ghost").await,
        Err(MatchError::IdentityNotFound(_))
    ));
}

#[tokio::test]
async fn failed_build_leaves_cache_untouched() {
    let store = store_with_users(&[UserRecord::new("U1", "Ana", Some("gone_fm"))]).await;
    let source = FakeSource::default().failing("gone_fm", Failure::NotFound);
    let service = ProfileService::new(store.clone(), Arc::new(source), &MatchingConfig::default());

    let err = service.get_or_build("U1", false).await.unwrap_err();
    assert!(matches!(err, MatchError::UpstreamNotFound(_)));

    let user = records::load_user(store.as_ref(), "U1").await.unwrap().unwrap();
    assert!(user.profile_data.listening_history.is_none());
}
