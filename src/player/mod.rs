//! Player domain: match history, aggregate stats and the leaderboard.
//!
//! Consumes the identity established by access tokens; never touches
//! credentials itself.

mod service;

pub use service::{clamp_leaderboard_limit, PlayerService, DEFAULT_LEADERBOARD_LIMIT, MAX_LEADERBOARD_LIMIT};
