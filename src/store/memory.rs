//! In-process store behind a single lock.
//!
//! Used by the test suite and for running the server without Postgres. One
//! `RwLock` guards every table, which makes `replace` and cascading deletes
//! atomic for free.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PlayerStore, RefreshTokenStore, StoreResult, UserStore};
use crate::error::StoreError;
use crate::models::{LeaderboardEntry, Match, NewMatch, PlayerStats, RefreshToken, User};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tokens: HashMap<String, RefreshToken>,
    matches: Vec<Match>,
    stats: HashMap<Uuid, PlayerStats>,
    next_match_id: i64,
    next_stats_id: i64,
}

impl Tables {
    fn upsert_stats(&mut self, user_id: Uuid, kills: i32, level: i32, at: DateTime<Utc>) -> PlayerStats {
        let stats = match self.stats.entry(user_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.next_stats_id += 1;
                entry.insert(PlayerStats {
                    id: self.next_stats_id,
                    user_id,
                    total_kills: 0,
                    highest_level: level,
                    updated_at: at,
                })
            }
        };

        stats.total_kills += kills;
        stats.highest_level = stats.highest_level.max(level);
        stats.updated_at = at;
        stats.clone()
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn insert(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation("username"));
        }
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("email"));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::UniqueViolation("email"));
        }
        match tables.users.get_mut(&user.id) {
            Some(stored) => {
                stored.email = user.email.clone();
                stored.password_hash = user.password_hash.clone();
                stored.is_active = user.is_active;
                Ok(())
            }
            None => Err(StoreError::Database(format!("user {} does not exist", user.id))),
        }
    }

    async fn delete(&self, user_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&user_id).is_none() {
            return Ok(false);
        }
        tables.tokens.retain(|_, t| t.user_id != user_id);
        tables.matches.retain(|m| m.user_id != user_id);
        tables.stats.remove(&user_id);
        Ok(true)
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryStore {
    async fn find_by_hash(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(self.tables.read().await.tokens.get(token_hash).cloned())
    }

    async fn insert(&self, token: &RefreshToken) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.tokens.contains_key(&token.token_hash) {
            return Err(StoreError::UniqueViolation("token"));
        }
        tables.tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_active_by_user(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<RefreshToken>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tokens
            .values()
            .filter(|t| t.user_id == user_id && t.is_active_at(at))
            .cloned()
            .collect())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let mut revoked = 0;
        for token in tables
            .tokens
            .values_mut()
            .filter(|t| t.user_id == user_id && t.is_active_at(at))
        {
            token.revoked_at = Some(at);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn revoke(&self, token_hash: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.tokens.get_mut(token_hash) {
            Some(token) if token.revoked_at.is_none() => {
                token.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn replace(
        &self,
        old_hash: &str,
        at: DateTime<Utc>,
        successor: &RefreshToken,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.tokens.contains_key(&successor.token_hash) {
            return Err(StoreError::UniqueViolation("token"));
        }
        match tables.tokens.get_mut(old_hash) {
            Some(old) if old.is_active_at(at) => old.revoked_at = Some(at),
            _ => return Ok(false),
        }
        tables
            .tokens
            .insert(successor.token_hash.clone(), successor.clone());
        Ok(true)
    }
}

#[async_trait]
impl PlayerStore for InMemoryStore {
    async fn record_match(
        &self,
        user_id: Uuid,
        new_match: &NewMatch,
        kills: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<Match> {
        let mut tables = self.tables.write().await;
        tables.next_match_id += 1;
        let stored = Match {
            id: tables.next_match_id,
            user_id,
            time: new_match.time,
            level: new_match.level,
            max_health: new_match.max_health,
            created_at: at,
            item_ids: new_match.item_ids.clone(),
        };
        tables.matches.push(stored.clone());
        tables.upsert_stats(user_id, kills, new_match.level, at);
        Ok(stored)
    }

    async fn upsert_stats(
        &self,
        user_id: Uuid,
        kills: i32,
        level: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<PlayerStats> {
        Ok(self.tables.write().await.upsert_stats(user_id, kills, level, at))
    }

    async fn find_stats(&self, user_id: Uuid) -> StoreResult<Option<PlayerStats>> {
        Ok(self.tables.read().await.stats.get(&user_id).cloned())
    }

    async fn list_matches(&self, user_id: Uuid) -> StoreResult<Vec<Match>> {
        let tables = self.tables.read().await;
        let mut matches: Vec<Match> = tables
            .matches
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(matches)
    }

    async fn find_match(&self, match_id: i64, user_id: Uuid) -> StoreResult<Option<Match>> {
        let tables = self.tables.read().await;
        Ok(tables
            .matches
            .iter()
            .find(|m| m.id == match_id && m.user_id == user_id)
            .cloned())
    }

    async fn leaderboard(&self, limit: i64) -> StoreResult<Vec<LeaderboardEntry>> {
        let tables = self.tables.read().await;
        let mut ranked: Vec<(&PlayerStats, &User)> = tables
            .stats
            .values()
            .filter_map(|s| tables.users.get(&s.user_id).map(|u| (s, u)))
            .collect();
        ranked.sort_by(|(a, _), (b, _)| {
            b.total_kills
                .cmp(&a.total_kills)
                .then(b.highest_level.cmp(&a.highest_level))
                .then(a.updated_at.cmp(&b.updated_at))
        });

        Ok(ranked
            .into_iter()
            .take(limit.max(0) as usize)
            .enumerate()
            .map(|(i, (stats, user))| LeaderboardEntry {
                rank: i as i32 + 1,
                user_id: user.id,
                username: user.username.clone(),
                total_kills: stats.total_kills,
                highest_level: stats.highest_level,
                updated_at: stats.updated_at,
            })
            .collect())
    }
}
