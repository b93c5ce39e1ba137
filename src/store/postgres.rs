//! PostgreSQL implementations of the store traits (sqlx).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{PlayerStore, RefreshTokenStore, StoreResult, UserStore};
use crate::models::{LeaderboardEntry, Match, NewMatch, PlayerStats, RefreshToken, User};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    user_id: Uuid,
    token_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    replaces_token_hash: Option<String>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshToken {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            created_at: row.created_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            replaces_token_hash: row.replaces_token_hash,
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active, created_at";
const TOKEN_COLUMNS: &str =
    "id, user_id, token_hash, created_at, expires_at, revoked_at, replaces_token_hash";

/// Credential store backed by the `users` table
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.find_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_one("email", email).await
    }

    async fn find_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn insert(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET email = $2, password_hash = $3, is_active = $4
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> StoreResult<bool> {
        // refresh_tokens, matches and player_stats cascade
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Refresh token store backed by the `refresh_tokens` table
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSERT_TOKEN: &str = r#"
    INSERT INTO refresh_tokens
        (id, user_id, token_hash, created_at, expires_at, revoked_at, replaces_token_hash)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn find_by_hash(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(&format!(
            "SELECT {} FROM refresh_tokens WHERE token_hash = $1",
            TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RefreshToken::from))
    }

    async fn insert(&self, token: &RefreshToken) -> StoreResult<()> {
        sqlx::query(INSERT_TOKEN)
            .bind(token.id)
            .bind(token.user_id)
            .bind(&token.token_hash)
            .bind(token.created_at)
            .bind(token.expires_at)
            .bind(token.revoked_at)
            .bind(&token.replaces_token_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_active_by_user(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<RefreshToken>> {
        let rows = sqlx::query_as::<_, RefreshTokenRow>(&format!(
            r#"
            SELECT {}
            FROM refresh_tokens
            WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > $2
            "#,
            TOKEN_COLUMNS
        ))
        .bind(user_id)
        .bind(at)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RefreshToken::from).collect())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE user_id = $2 AND revoked_at IS NULL AND expires_at > $1
            "#,
        )
        .bind(at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn revoke(&self, token_hash: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE token_hash = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(at)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn replace(
        &self,
        old_hash: &str,
        at: DateTime<Utc>,
        successor: &RefreshToken,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken here serialises concurrent rotations of the same
        // token; the loser re-evaluates the predicate and matches nothing.
        let revoked = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE token_hash = $2 AND revoked_at IS NULL AND expires_at > $1
            "#,
        )
        .bind(at)
        .bind(old_hash)
        .execute(&mut tx)
        .await?;

        if revoked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(INSERT_TOKEN)
            .bind(successor.id)
            .bind(successor.user_id)
            .bind(&successor.token_hash)
            .bind(successor.created_at)
            .bind(successor.expires_at)
            .bind(successor.revoked_at)
            .bind(&successor.replaces_token_hash)
            .execute(&mut tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[derive(sqlx::FromRow)]
struct MatchRow {
    id: i64,
    user_id: Uuid,
    time_seconds: i32,
    level: i32,
    max_health: i32,
    created_at: DateTime<Utc>,
}

impl MatchRow {
    fn into_match(self, item_ids: Vec<i32>) -> Match {
        Match {
            id: self.id,
            user_id: self.user_id,
            time: self.time_seconds,
            level: self.level,
            max_health: self.max_health,
            created_at: self.created_at,
            item_ids,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    id: i64,
    user_id: Uuid,
    total_kills: i32,
    highest_level: i32,
    updated_at: DateTime<Utc>,
}

impl From<StatsRow> for PlayerStats {
    fn from(row: StatsRow) -> Self {
        PlayerStats {
            id: row.id,
            user_id: row.user_id,
            total_kills: row.total_kills,
            highest_level: row.highest_level,
            updated_at: row.updated_at,
        }
    }
}

const MATCH_COLUMNS: &str = "id, user_id, time_seconds, level, max_health, created_at";

const UPSERT_STATS: &str = r#"
    INSERT INTO player_stats (user_id, total_kills, highest_level, updated_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (user_id) DO UPDATE
    SET total_kills = player_stats.total_kills + EXCLUDED.total_kills,
        highest_level = GREATEST(player_stats.highest_level, EXCLUDED.highest_level),
        updated_at = EXCLUDED.updated_at
    RETURNING id, user_id, total_kills, highest_level, updated_at
"#;

/// Match history and stats backed by `matches`, `match_items` and `player_stats`
#[derive(Clone)]
pub struct PgPlayerStore {
    pool: PgPool,
}

impl PgPlayerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn item_ids_for(&self, match_ids: &[i64]) -> StoreResult<HashMap<i64, Vec<i32>>> {
        let rows = sqlx::query_as::<_, (i64, i32)>(
            "SELECT match_id, item_id FROM match_items WHERE match_id = ANY($1) ORDER BY id",
        )
        .bind(match_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<i32>> = HashMap::new();
        for (match_id, item_id) in rows {
            grouped.entry(match_id).or_default().push(item_id);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl PlayerStore for PgPlayerStore {
    async fn record_match(
        &self,
        user_id: Uuid,
        new_match: &NewMatch,
        kills: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<Match> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MatchRow>(&format!(
            r#"
            INSERT INTO matches (user_id, time_seconds, level, max_health, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            MATCH_COLUMNS
        ))
        .bind(user_id)
        .bind(new_match.time)
        .bind(new_match.level)
        .bind(new_match.max_health)
        .bind(at)
        .fetch_one(&mut tx)
        .await?;

        for item_id in &new_match.item_ids {
            sqlx::query("INSERT INTO match_items (match_id, item_id) VALUES ($1, $2)")
                .bind(row.id)
                .bind(*item_id)
                .execute(&mut tx)
                .await?;
        }

        sqlx::query(UPSERT_STATS)
            .bind(user_id)
            .bind(kills)
            .bind(new_match.level)
            .bind(at)
            .execute(&mut tx)
            .await?;

        tx.commit().await?;
        Ok(row.into_match(new_match.item_ids.clone()))
    }

    async fn upsert_stats(
        &self,
        user_id: Uuid,
        kills: i32,
        level: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<PlayerStats> {
        let row = sqlx::query_as::<_, StatsRow>(UPSERT_STATS)
            .bind(user_id)
            .bind(kills)
            .bind(level)
            .bind(at)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn find_stats(&self, user_id: Uuid) -> StoreResult<Option<PlayerStats>> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT id, user_id, total_kills, highest_level, updated_at
            FROM player_stats
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PlayerStats::from))
    }

    async fn list_matches(&self, user_id: Uuid) -> StoreResult<Vec<Match>> {
        let rows = sqlx::query_as::<_, MatchRow>(&format!(
            "SELECT {} FROM matches WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            MATCH_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut items = self.item_ids_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let item_ids = items.remove(&row.id).unwrap_or_default();
                row.into_match(item_ids)
            })
            .collect())
    }

    async fn find_match(&self, match_id: i64, user_id: Uuid) -> StoreResult<Option<Match>> {
        let row = sqlx::query_as::<_, MatchRow>(&format!(
            "SELECT {} FROM matches WHERE id = $1 AND user_id = $2",
            MATCH_COLUMNS
        ))
        .bind(match_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let item_ids = self
                    .item_ids_for(&[row.id])
                    .await?
                    .remove(&row.id)
                    .unwrap_or_default();
                Ok(Some(row.into_match(item_ids)))
            }
            None => Ok(None),
        }
    }

    async fn leaderboard(&self, limit: i64) -> StoreResult<Vec<LeaderboardEntry>> {
        let rows = sqlx::query_as::<_, (Uuid, String, i32, i32, DateTime<Utc>)>(
            r#"
            SELECT s.user_id, u.username, s.total_kills, s.highest_level, s.updated_at
            FROM player_stats s
            JOIN users u ON u.id = s.user_id
            ORDER BY s.total_kills DESC, s.highest_level DESC, s.updated_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(
                |(i, (user_id, username, total_kills, highest_level, updated_at))| LeaderboardEntry {
                    rank: i as i32 + 1,
                    user_id,
                    username,
                    total_kills,
                    highest_level,
                    updated_at,
                },
            )
            .collect())
    }
}
