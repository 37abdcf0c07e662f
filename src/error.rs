// Classified errors for the matching engine.
//
// Callers branch on the variant, never on the message. The per-participant
// error list stored on a session uses `code()` so the classification
// survives the round trip through the document store.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, MatchError>;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("User not found: {0}")]
    IdentityNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("No Last.fm account linked for user {0}")]
    NoIdentitySource(String),

    // Listening-history source failures
    #[error("Last.fm user not found: {0}")]
    UpstreamNotFound(String),

    #[error("No listening history available for {0}")]
    UpstreamNoHistory(String),

    #[error("Last.fm API credentials missing or rejected: {0}")]
    UpstreamCredentialsMissing(String),

    #[error("Access to Last.fm data forbidden for {0}")]
    UpstreamForbidden(String),

    #[error("Last.fm request failed: {0}")]
    UpstreamTransient(String),

    // Session matching
    #[error("Need at least 2 participants to compute matches, session has {found}")]
    InsufficientParticipants { found: usize },

    #[error("Not enough profiles available. Got {built}, need at least 2")]
    InsufficientProfiles { built: usize },

    #[error("Malformed taste profile: {0}")]
    MalformedProfile(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl MatchError {
    /// Machine-readable error code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::IdentityNotFound(_) => "IDENTITY_NOT_FOUND",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::NoIdentitySource(_) => "NO_IDENTITY_SOURCE",
            Self::UpstreamNotFound(_) => "UPSTREAM_NOT_FOUND",
            Self::UpstreamNoHistory(_) => "UPSTREAM_NO_HISTORY",
            Self::UpstreamCredentialsMissing(_) => "UPSTREAM_CREDENTIALS_MISSING",
            Self::UpstreamForbidden(_) => "UPSTREAM_FORBIDDEN",
            Self::UpstreamTransient(_) => "UPSTREAM_TRANSIENT",
            Self::InsufficientParticipants { .. } => "INSUFFICIENT_PARTICIPANTS",
            Self::InsufficientProfiles { .. } => "INSUFFICIENT_PROFILES",
            Self::MalformedProfile(_) => "MALFORMED_PROFILE",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// True for failures reported by the listening-history source.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamNotFound(_)
                | Self::UpstreamNoHistory(_)
                | Self::UpstreamCredentialsMissing(_)
                | Self::UpstreamForbidden(_)
                | Self::UpstreamTransient(_)
        )
    }
}
