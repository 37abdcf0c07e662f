// Matching — compatibility scoring for pairs and whole sessions.

pub mod compatibility;
pub mod session;

pub use compatibility::{calculate_compatibility, CompatibilityRecord, CompatibilityWeights};
pub use session::{ProfileError, SessionMatchSet, SessionMatcher, StoredMatches};
