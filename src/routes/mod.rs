mod auth;
mod health_check;
mod player;

pub use auth::{login, logout, refresh, register};
pub use health_check::{health_check, ping};
pub use player::{create_match, get_leaderboard, get_match, get_matches, get_stats};

use uuid::Uuid;

use crate::auth::Claims;
use crate::error::AppError;

/// User id of the caller whose claims the JWT middleware injected
pub(crate) fn authenticated_user(claims: &Claims) -> Result<Uuid, AppError> {
    claims
        .user_id()
        .map_err(|e| AppError::Unauthorized(e.to_string()))
}
