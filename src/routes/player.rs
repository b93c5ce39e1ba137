/// Player Routes
///
/// Match history and stats for the authenticated player, plus the public
/// leaderboard.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::Claims;
use crate::error::AppError;
use crate::models::NewMatch;
use crate::player::PlayerService;
use crate::routes::authenticated_user;

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

/// GET /api/player/stats
///
/// # Errors
/// - 404: The player has not finished a match yet
pub async fn get_stats(
    claims: web::ReqData<Claims>,
    players: web::Data<PlayerService>,
) -> Result<HttpResponse, AppError> {
    let user_id = authenticated_user(&claims)?;

    let stats = players
        .stats(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Player stats not found".to_string()))?;

    Ok(HttpResponse::Ok().json(stats))
}

/// POST /api/player/match
///
/// # Errors
/// - 400: Negative time or max health, or level below 1
pub async fn create_match(
    claims: web::ReqData<Claims>,
    form: web::Json<NewMatch>,
    players: web::Data<PlayerService>,
) -> Result<HttpResponse, AppError> {
    let user_id = authenticated_user(&claims)?;
    let stored = players.record_match(user_id, form.into_inner()).await?;

    Ok(HttpResponse::Created()
        .insert_header(("Location", format!("/api/player/match/{}", stored.id)))
        .json(stored))
}

/// GET /api/player/matches
pub async fn get_matches(
    claims: web::ReqData<Claims>,
    players: web::Data<PlayerService>,
) -> Result<HttpResponse, AppError> {
    let user_id = authenticated_user(&claims)?;
    Ok(HttpResponse::Ok().json(players.matches(user_id).await?))
}

/// GET /api/player/match/{match_id}
///
/// # Errors
/// - 404: No such match, or it belongs to another player
pub async fn get_match(
    claims: web::ReqData<Claims>,
    path: web::Path<i64>,
    players: web::Data<PlayerService>,
) -> Result<HttpResponse, AppError> {
    let user_id = authenticated_user(&claims)?;

    let found = players
        .match_by_id(path.into_inner(), user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Match not found".to_string()))?;

    Ok(HttpResponse::Ok().json(found))
}

/// GET /api/player/leaderboard?limit=N
///
/// Anonymous. `limit` outside 1..=1000 falls back to 100.
pub async fn get_leaderboard(
    query: web::Query<LeaderboardQuery>,
    players: web::Data<PlayerService>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(players.leaderboard(query.limit).await?))
}
