use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, ValidationError};
use crate::models::{LeaderboardEntry, Match, NewMatch, PlayerStats};
use crate::store::PlayerStore;

pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 100;
pub const MAX_LEADERBOARD_LIMIT: i64 = 1000;

/// Anything outside `1..=1000` falls back to the default page size
pub fn clamp_leaderboard_limit(limit: Option<i64>) -> i64 {
    match limit {
        Some(limit) if (1..=MAX_LEADERBOARD_LIMIT).contains(&limit) => limit,
        _ => DEFAULT_LEADERBOARD_LIMIT,
    }
}

#[derive(Clone)]
pub struct PlayerService {
    store: Arc<dyn PlayerStore>,
}

impl PlayerService {
    pub fn new(store: Arc<dyn PlayerStore>) -> Self {
        Self { store }
    }

    /// Store a finished match and fold it into the player's stats.
    ///
    /// The client reports the reached level as the kill count, so
    /// `total_kills` grows by `level`.
    ///
    /// # Errors
    /// `Validation` for negative time or max health, or a level below 1
    pub async fn record_match(&self, user_id: Uuid, new_match: NewMatch) -> Result<Match, AppError> {
        validate_match(&new_match)?;

        let stored = self
            .store
            .record_match(user_id, &new_match, new_match.level, Utc::now())
            .await?;

        tracing::info!(
            user_id = %user_id,
            match_id = stored.id,
            level = stored.level,
            items = stored.item_ids.len(),
            "Match recorded"
        );
        Ok(stored)
    }

    /// Add `kills` and raise the highest level without recording a match
    pub async fn update_stats(
        &self,
        user_id: Uuid,
        kills: i32,
        level: i32,
    ) -> Result<PlayerStats, AppError> {
        if kills < 0 {
            return Err(ValidationError::OutOfRange("kills".into()).into());
        }
        if level < 1 {
            return Err(ValidationError::OutOfRange("level".into()).into());
        }

        Ok(self
            .store
            .upsert_stats(user_id, kills, level, Utc::now())
            .await?)
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<Option<PlayerStats>, AppError> {
        Ok(self.store.find_stats(user_id).await?)
    }

    /// Newest first
    pub async fn matches(&self, user_id: Uuid) -> Result<Vec<Match>, AppError> {
        Ok(self.store.list_matches(user_id).await?)
    }

    /// Only returns the match if `user_id` owns it
    pub async fn match_by_id(&self, match_id: i64, user_id: Uuid) -> Result<Option<Match>, AppError> {
        Ok(self.store.find_match(match_id, user_id).await?)
    }

    pub async fn leaderboard(&self, limit: Option<i64>) -> Result<Vec<LeaderboardEntry>, AppError> {
        Ok(self.store.leaderboard(clamp_leaderboard_limit(limit)).await?)
    }
}

fn validate_match(new_match: &NewMatch) -> Result<(), ValidationError> {
    if new_match.time < 0 {
        return Err(ValidationError::OutOfRange("time".into()));
    }
    if new_match.level < 1 {
        return Err(ValidationError::OutOfRange("level".into()));
    }
    if new_match.max_health < 0 {
        return Err(ValidationError::OutOfRange("maxHealth".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::store::{InMemoryStore, UserStore};

    fn service() -> (PlayerService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (PlayerService::new(store.clone()), store)
    }

    fn new_match(level: i32) -> NewMatch {
        NewMatch {
            time: 300,
            level,
            max_health: 120,
            item_ids: vec![1, 4],
        }
    }

    async fn player(store: &InMemoryStore, name: &str) -> Uuid {
        let user = User::new(name.into(), format!("{}@x.com", name), "h".into());
        store.insert(&user).await.unwrap();
        user.id
    }

    #[test]
    fn test_clamp_leaderboard_limit() {
        assert_eq!(clamp_leaderboard_limit(None), 100);
        assert_eq!(clamp_leaderboard_limit(Some(0)), 100);
        assert_eq!(clamp_leaderboard_limit(Some(-5)), 100);
        assert_eq!(clamp_leaderboard_limit(Some(1001)), 100);
        assert_eq!(clamp_leaderboard_limit(Some(1)), 1);
        assert_eq!(clamp_leaderboard_limit(Some(1000)), 1000);
    }

    #[tokio::test]
    async fn test_record_match_updates_stats() {
        let (players, store) = service();
        let user_id = player(&store, "alice").await;

        let first = players.record_match(user_id, new_match(5)).await.unwrap();
        players.record_match(user_id, new_match(3)).await.unwrap();

        assert_eq!(first.item_ids, vec![1, 4]);
        let stats = players.stats(user_id).await.unwrap().unwrap();
        assert_eq!(stats.total_kills, 8);
        assert_eq!(stats.highest_level, 5);
    }

    #[tokio::test]
    async fn test_invalid_match_rejected() {
        let (players, store) = service();
        let user_id = player(&store, "alice").await;

        let mut bad = new_match(0);
        assert!(players.record_match(user_id, bad.clone()).await.is_err());
        bad.level = 2;
        bad.time = -1;
        assert!(matches!(
            players.record_match(user_id, bad).await,
            Err(AppError::Validation(ValidationError::OutOfRange(_)))
        ));
        assert!(players.stats(user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_matches_newest_first_and_owned() {
        let (players, store) = service();
        let alice = player(&store, "alice").await;
        let bob = player(&store, "bob").await;

        let older = players.record_match(alice, new_match(1)).await.unwrap();
        let newer = players.record_match(alice, new_match(2)).await.unwrap();

        let ids: Vec<i64> = players
            .matches(alice)
            .await
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        assert!(players.match_by_id(older.id, alice).await.unwrap().is_some());
        assert!(players.match_by_id(older.id, bob).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_stats_without_match() {
        let (players, store) = service();
        let user_id = player(&store, "alice").await;

        let stats = players.update_stats(user_id, 12, 4).await.unwrap();
        assert_eq!(stats.total_kills, 12);
        assert!(players.matches(user_id).await.unwrap().is_empty());

        assert!(players.update_stats(user_id, -1, 4).await.is_err());
    }

    #[tokio::test]
    async fn test_leaderboard_ordering() {
        let (players, store) = service();
        let alice = player(&store, "alice").await;
        let bob = player(&store, "bob").await;
        let carol = player(&store, "carol").await;

        players.update_stats(alice, 10, 3).await.unwrap();
        players.update_stats(bob, 20, 2).await.unwrap();
        players.update_stats(carol, 10, 5).await.unwrap();

        let board = players.leaderboard(None).await.unwrap();
        let names: Vec<&str> = board.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "carol", "alice"]);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[2].rank, 3);

        assert_eq!(players.leaderboard(Some(2)).await.unwrap().len(), 2);
    }
}
