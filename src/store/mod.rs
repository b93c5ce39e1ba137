//! Storage collaborator traits.
//!
//! The auth core and the player domain only see these traits; Postgres and
//! in-process implementations live in the submodules.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{LeaderboardEntry, Match, NewMatch, PlayerStats, RefreshToken, User};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::{PgPlayerStore, PgRefreshTokenStore, PgUserStore};

pub type StoreResult<T> = Result<T, StoreError>;

/// Credential store: user records with unique username and email
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>>;

    /// Fails with `UniqueViolation("username" | "email")` on collision
    async fn insert(&self, user: &User) -> StoreResult<()>;

    /// Persist mutable fields (`email`, `password_hash`, `is_active`)
    async fn update(&self, user: &User) -> StoreResult<()>;

    /// Remove the user and every refresh token it owns.
    /// Returns `false` if no such user existed.
    async fn delete(&self, user_id: Uuid) -> StoreResult<bool>;
}

/// Refresh token store, keyed by token digest
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn find_by_hash(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>>;

    async fn insert(&self, token: &RefreshToken) -> StoreResult<()>;

    /// Tokens of `user_id` that are active at `at`
    async fn find_active_by_user(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<RefreshToken>>;

    /// Revoke, in one statement, every token of `user_id` active at `at`.
    /// Returns how many were newly revoked.
    async fn revoke_all_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<u64>;

    /// Set `revoked_at = at` if the token is not revoked yet.
    /// Returns whether this call revoked it.
    async fn revoke(&self, token_hash: &str, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Atomically revoke `old_hash` (only if still active at `at`) and insert
    /// `successor`. Returns `false`, inserting nothing, when the predecessor
    /// was no longer active; of two concurrent calls on the same predecessor
    /// at most one returns `true`.
    async fn replace(
        &self,
        old_hash: &str,
        at: DateTime<Utc>,
        successor: &RefreshToken,
    ) -> StoreResult<bool>;
}

/// Match history and aggregate player statistics
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Store a match and fold it into the player's stats in one unit of work
    async fn record_match(
        &self,
        user_id: Uuid,
        new_match: &NewMatch,
        kills: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<Match>;

    /// Add `kills` and raise `highest_level`, creating the row if needed
    async fn upsert_stats(
        &self,
        user_id: Uuid,
        kills: i32,
        level: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<PlayerStats>;

    async fn find_stats(&self, user_id: Uuid) -> StoreResult<Option<PlayerStats>>;

    /// Newest first
    async fn list_matches(&self, user_id: Uuid) -> StoreResult<Vec<Match>>;

    async fn find_match(&self, match_id: i64, user_id: Uuid) -> StoreResult<Option<Match>>;

    /// Top `limit` players, ranked from 1
    async fn leaderboard(&self, limit: i64) -> StoreResult<Vec<LeaderboardEntry>>;
}
