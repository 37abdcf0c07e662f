// tastematch: Taste-profile matching for listening sessions
//
// This is the library root. Each module corresponds to a stage of the
// matching pipeline: fetch listening history, vectorize it into a profile,
// cache it, and score participants against each other.

pub mod config;
pub mod db;
pub mod error;
pub mod lastfm;
pub mod matching;
pub mod output;
pub mod profile;
pub mod similarity;
pub mod status;
