/// Persistent records shared by the auth core and the player domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity record owned by the credential store
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    /// Unique, compared case-sensitively
    pub username: String,
    pub email: String,
    /// bcrypt hash, never the plaintext
    pub password_hash: String,
    /// `false` means the account is deactivated and may not log in
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build a fresh, active user record
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// A single grant of re-authentication capability.
///
/// Only the SHA-256 digest of the opaque token string is kept; the plaintext
/// leaves the server once, at issuance.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Set once, never cleared
    pub revoked_at: Option<DateTime<Utc>>,
    /// Digest of the token this one superseded
    pub replaces_token_hash: Option<String>,
}

impl RefreshToken {
    /// Active iff not revoked and `at` is strictly before expiry
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && at < self.expires_at
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }
}

/// A recorded game session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: i64,
    pub user_id: Uuid,
    /// Survival time in seconds
    pub time: i32,
    pub level: i32,
    pub max_health: i32,
    pub created_at: DateTime<Utc>,
    pub item_ids: Vec<i32>,
}

/// Match payload submitted by the game client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMatch {
    pub time: i32,
    pub level: i32,
    pub max_health: i32,
    #[serde(default)]
    pub item_ids: Vec<i32>,
}

/// Aggregate statistics, one row per player
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub id: i64,
    pub user_id: Uuid,
    pub total_kills: i32,
    pub highest_level: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i32,
    pub user_id: Uuid,
    pub username: String,
    pub total_kills: i32,
    pub highest_level: i32,
    pub updated_at: DateTime<Utc>,
}
