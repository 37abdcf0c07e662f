// Typed record access on top of the document store.
//
// These helpers convert between JSON documents and the models in
// `db::models`. User and session creation live here only so the CLI can
// seed a store; the matching engine itself only reads them.

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;

use super::models::{Collection, ParticipantRef, SessionRecord, UserRecord};
use super::traits::DocumentStore;

/// Load a user record by code.
pub async fn load_user(store: &dyn DocumentStore, code: &str) -> Result<Option<UserRecord>> {
    match store.get_record(Collection::Users, code).await? {
        Some(doc) => {
            let user = serde_json::from_value(doc)
                .with_context(|| format!("Malformed user record {code}"))?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

/// Store a user record, replacing any existing one with the same code.
pub async fn save_user(store: &dyn DocumentStore, user: &UserRecord) -> Result<()> {
    let doc = serde_json::to_value(user)?;
    store.set_record(Collection::Users, &user.code, &doc).await
}

/// Load a session record by code.
pub async fn load_session(store: &dyn DocumentStore, code: &str) -> Result<Option<SessionRecord>> {
    match store.get_record(Collection::Sessions, code).await? {
        Some(doc) => {
            let session = serde_json::from_value(doc)
                .with_context(|| format!("Malformed session record {code}"))?;
            Ok(Some(session))
        }
        None => Ok(None),
    }
}

/// Store a session record, replacing any existing one with the same code.
pub async fn save_session(store: &dyn DocumentStore, session: &SessionRecord) -> Result<()> {
    let doc = serde_json::to_value(session)?;
    store.set_record(Collection::Sessions, &session.code, &doc).await
}

/// Add a user to a session's participant list.
///
/// Fails if either record is missing, the user already joined, or the
/// session is at its maximum size.
pub async fn join_session(
    store: &dyn DocumentStore,
    session_code: &str,
    user_code: &str,
) -> Result<SessionRecord> {
    let mut session = load_session(store, session_code)
        .await?
        .with_context(|| format!("Session not found: {session_code}"))?;

    if load_user(store, user_code).await?.is_none() {
        anyhow::bail!("User not found: {user_code}");
    }

    if session
        .participants
        .iter()
        .any(|p| p.identity() == Some(user_code))
    {
        anyhow::bail!("User {user_code} is already in session {session_code}");
    }

    if let Some(max) = session.max_size {
        if session.participants.len() >= max as usize {
            anyhow::bail!("Session {session_code} is full ({max} participants)");
        }
    }

    session
        .participants
        .push(ParticipantRef::Identity(user_code.to_string()));

    let fields = json!({
        "participants": session.participants,
        "updatedAt": Utc::now(),
    });
    store
        .update_fields(Collection::Sessions, session_code, &fields)
        .await?;

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteStore;

    #[tokio::test]
    async fn test_user_roundtrip() {
        let store = SqliteStore::in_memory().unwrap();
        let user = UserRecord::new("U1", "Ana", Some("ana_fm"));
        save_user(&store, &user).await.unwrap();

        let loaded = load_user(&store, "U1").await.unwrap().unwrap();
        assert_eq!(loaded.name, "Ana");
        assert_eq!(loaded.source_username(), Some("ana_fm"));
        assert!(load_user(&store, "U2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_join_session() {
        let store = SqliteStore::in_memory().unwrap();
        save_user(&store, &UserRecord::new("U1", "Ana", None)).await.unwrap();
        save_user(&store, &UserRecord::new("U2", "Bo", None)).await.unwrap();
        save_session(&store, &SessionRecord::new("S1", "Party", Some(1)))
            .await
            .unwrap();

        let session = join_session(&store, "S1", "U1").await.unwrap();
        assert_eq!(session.participant_identities(), vec!["U1"]);

        // Already joined, then full
        assert!(join_session(&store, "S1", "U1").await.is_err());
        assert!(join_session(&store, "S1", "U2").await.is_err());

        let stored = load_session(&store, "S1").await.unwrap().unwrap();
        assert_eq!(stored.participant_identities(), vec!["U1"]);
        assert_eq!(stored.name.as_deref(), Some("Party"));
    }

    #[tokio::test]
    async fn test_join_requires_existing_records() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(join_session(&store, "S404", "U1").await.is_err());

        save_session(&store, &SessionRecord::new("S1", "Party", None))
            .await
            .unwrap();
        assert!(join_session(&store, "S1", "U404").await.is_err());
    }
}
