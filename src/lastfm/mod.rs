// Listening-history source — the Last.fm client and the trait it implements.

pub mod client;
pub mod rate_limiter;
pub mod traits;
