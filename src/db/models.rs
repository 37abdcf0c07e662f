// Data models — typed views of the documents in each collection.
//
// Documents are stored as camelCase JSON. Unknown fields are ignored on
// read, so records written by other tools sharing the store still load.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::matching::{CompatibilityRecord, ProfileError};

/// The document collections this crate reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Sessions,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Sessions => "sessions",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub code: String,
    pub name: String,
    /// Linked Last.fm account, if any
    #[serde(default)]
    pub lastfm_username: Option<String>,
    #[serde(default)]
    pub profile_data: ProfileData,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Cached profile data nested inside a user document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    /// The cached taste profile, kept raw so a malformed one doesn't make
    /// the whole user record unreadable
    #[serde(default)]
    pub listening_history: Option<Value>,
}

impl UserRecord {
    pub fn new(code: &str, name: &str, lastfm_username: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            code: code.to_string(),
            name: name.to_string(),
            lastfm_username: lastfm_username.map(str::to_string),
            profile_data: ProfileData::default(),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// The linked Last.fm username, if present and non-blank.
    pub fn source_username(&self) -> Option<&str> {
        self.lastfm_username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

/// A session document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub max_size: Option<u32>,
    #[serde(default)]
    pub participants: Vec<ParticipantRef>,
    /// Match sets this crate can't read (older or foreign shapes) load as None
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub matches: Option<Vec<CompatibilityRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_completed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub profile_errors: Vec<ProfileError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles_loaded: Option<usize>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn new(code: &str, name: &str, max_size: Option<u32>) -> Self {
        let now = Utc::now();
        Self {
            code: code.to_string(),
            name: Some(name.to_string()),
            max_size,
            participants: Vec::new(),
            matches: None,
            matching_completed_at: None,
            profile_errors: Vec::new(),
            profiles_loaded: None,
            status: Some("waiting".to_string()),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Participant identities in listed order, first occurrence kept.
    /// Entries that carry no identity are skipped.
    pub fn participant_identities(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.participants
            .iter()
            .filter_map(ParticipantRef::identity)
            .filter(|id| seen.insert(id.to_string()))
            .map(str::to_string)
            .collect()
    }
}

/// Decode a field that is rewritten wholesale by matching. A value in an
/// unreadable shape reads as the default instead of failing the record.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// A participant entry: either a bare identity or an object carrying one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParticipantRef {
    Identity(String),
    Entry(ParticipantEntry),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantEntry {
    #[serde(default, alias = "identity", alias = "code")]
    pub user_code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ParticipantRef {
    pub fn identity(&self) -> Option<&str> {
        let id = match self {
            ParticipantRef::Identity(id) => id.as_str(),
            ParticipantRef::Entry(entry) => entry.user_code.as_deref()?,
        };
        let id = id.trim();
        (!id.is_empty()).then_some(id)
    }
}
