/// Refresh Token Management
///
/// Refresh tokens are:
/// - 64 bytes from the OS RNG, base64url-encoded
/// - Hashed with SHA-256 before storage (never store plaintext)
/// - Single-use: rotation revokes the predecessor and inserts the successor
///   in one store transaction
/// - Revocable per user (logout)

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::configuration::JwtSettings;
use crate::error::TokenError;
use crate::models::RefreshToken;
use crate::store::RefreshTokenStore;

const REFRESH_TOKEN_BYTE_LENGTH: usize = 64;

/// A freshly minted token: the plaintext for the client and the stored record
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub record: RefreshToken,
}

impl IssuedRefreshToken {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.record.expires_at
    }
}

/// Generate a new cryptographically secure refresh token string
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTE_LENGTH];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a refresh token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
pub struct RefreshTokenManager {
    store: Arc<dyn RefreshTokenStore>,
    ttl: Duration,
    strict_rotation: bool,
}

impl RefreshTokenManager {
    pub fn new(store: Arc<dyn RefreshTokenStore>, config: &JwtSettings) -> Self {
        Self {
            store,
            ttl: Duration::seconds(config.refresh_token_expiry),
            strict_rotation: config.strict_rotation,
        }
    }

    fn mint(&self, user_id: Uuid, replaces: Option<String>) -> IssuedRefreshToken {
        let token = generate_refresh_token();
        let now = Utc::now();
        IssuedRefreshToken {
            record: RefreshToken {
                id: Uuid::new_v4(),
                user_id,
                token_hash: hash_token(&token),
                created_at: now,
                expires_at: now + self.ttl,
                revoked_at: None,
                replaces_token_hash: replaces,
            },
            token,
        }
    }

    /// Issue and persist a new, unchained token for `user_id`
    ///
    /// # Errors
    /// Returns error if the store rejects the insert
    pub async fn issue(&self, user_id: Uuid) -> Result<IssuedRefreshToken, TokenError> {
        let issued = self.mint(user_id, None);
        self.store.insert(&issued.record).await?;
        Ok(issued)
    }

    /// Retire `old_token` and issue its successor for `user_id`.
    ///
    /// An unknown predecessor yields a fresh unchained token unless strict
    /// rotation is configured.
    ///
    /// # Errors
    /// - `NotFound` if the predecessor belongs to another user, or is unknown
    ///   under strict rotation
    /// - `ExpiredOrRevoked` if the predecessor is no longer active, including
    ///   losing a race against a concurrent rotation of the same token
    pub async fn rotate(
        &self,
        old_token: &str,
        user_id: Uuid,
    ) -> Result<IssuedRefreshToken, TokenError> {
        let old_hash = hash_token(old_token);

        let existing = match self.store.find_by_hash(&old_hash).await? {
            Some(existing) => existing,
            None if self.strict_rotation => {
                tracing::warn!(user_id = %user_id, "Rotation of unknown refresh token rejected");
                return Err(TokenError::NotFound);
            }
            None => {
                tracing::warn!(
                    user_id = %user_id,
                    "Rotation of unknown refresh token; issuing an unchained token"
                );
                return self.issue(user_id).await;
            }
        };

        if existing.user_id != user_id {
            tracing::warn!(user_id = %user_id, "Refresh token presented for another user");
            return Err(TokenError::NotFound);
        }

        let successor = self.mint(user_id, Some(old_hash.clone()));
        if self.store.replace(&old_hash, Utc::now(), &successor.record).await? {
            Ok(successor)
        } else {
            tracing::warn!(user_id = %user_id, "Attempt to rotate an inactive refresh token");
            Err(TokenError::ExpiredOrRevoked)
        }
    }

    /// Look up a presented token and check that it is active
    ///
    /// # Errors
    /// - `NotFound` if no record matches
    /// - `ExpiredOrRevoked` if it is revoked or past expiry
    pub async fn validate(&self, token: &str) -> Result<RefreshToken, TokenError> {
        let record = self
            .store
            .find_by_hash(&hash_token(token))
            .await?
            .ok_or_else(|| {
                tracing::warn!("Refresh token not found in store");
                TokenError::NotFound
            })?;

        if record.revoked_at.is_some() {
            tracing::warn!(user_id = %record.user_id, "Attempt to use revoked refresh token");
            return Err(TokenError::ExpiredOrRevoked);
        }
        if !record.is_active() {
            tracing::info!(user_id = %record.user_id, "Refresh token expired");
            return Err(TokenError::ExpiredOrRevoked);
        }

        Ok(record)
    }

    /// Revoke every active token of `user_id`; returns how many were newly revoked
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, TokenError> {
        let revoked = self.store.revoke_all_for_user(user_id, Utc::now()).await?;

        tracing::info!(user_id = %user_id, revoked, "Refresh tokens revoked for user");
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn manager_with(strict_rotation: bool) -> (RefreshTokenManager, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let config = JwtSettings {
            strict_rotation,
            ..JwtSettings::default()
        };
        (RefreshTokenManager::new(store.clone(), &config), store)
    }

    fn manager() -> RefreshTokenManager {
        manager_with(false).0
    }

    #[test]
    fn test_generate_refresh_token() {
        let token = generate_refresh_token();

        // 64 bytes -> 86 base64url characters without padding
        assert_eq!(token.len(), 86);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, generate_refresh_token());
    }

    #[test]
    fn test_token_hashing() {
        let token = generate_refresh_token();
        let hash1 = hash_token(&token);
        let hash2 = hash_token(&token);

        assert_eq!(hash1, hash2);
        assert_ne!(token, hash1);
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, hash_token(&generate_refresh_token()));
    }

    #[tokio::test]
    async fn test_issue_sets_window() {
        let manager = manager();
        let user_id = Uuid::new_v4();
        let issued = manager.issue(user_id).await.unwrap();

        let record = &issued.record;
        assert_eq!(record.user_id, user_id);
        assert_eq!(record.expires_at - record.created_at, Duration::days(7));
        assert!(record.revoked_at.is_none());
        assert!(record.replaces_token_hash.is_none());
        assert_eq!(record.token_hash, hash_token(&issued.token));
    }

    #[tokio::test]
    async fn test_validate_unknown_token() {
        let result = manager().validate("never-issued").await;
        assert!(matches!(result, Err(TokenError::NotFound)));
    }

    #[tokio::test]
    async fn test_rotate_kills_predecessor() {
        let manager = manager();
        let user_id = Uuid::new_v4();
        let first = manager.issue(user_id).await.unwrap();

        let second = manager.rotate(&first.token, user_id).await.unwrap();

        assert!(matches!(
            manager.validate(&first.token).await,
            Err(TokenError::ExpiredOrRevoked)
        ));
        assert!(manager.validate(&second.token).await.is_ok());
        assert_eq!(
            second.record.replaces_token_hash.as_deref(),
            Some(first.record.token_hash.as_str())
        );
    }

    #[tokio::test]
    async fn test_rotate_twice_fails() {
        let manager = manager();
        let user_id = Uuid::new_v4();
        let first = manager.issue(user_id).await.unwrap();

        manager.rotate(&first.token, user_id).await.unwrap();
        let again = manager.rotate(&first.token, user_id).await;

        assert!(matches!(again, Err(TokenError::ExpiredOrRevoked)));
    }

    #[tokio::test]
    async fn test_concurrent_rotation_single_winner() {
        let manager = manager();
        let user_id = Uuid::new_v4();
        let first = manager.issue(user_id).await.unwrap();

        let (a, b) = tokio::join!(
            manager.rotate(&first.token, user_id),
            manager.rotate(&first.token, user_id)
        );

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    }

    #[tokio::test]
    async fn test_rotate_unknown_is_lenient_by_default() {
        let manager = manager();
        let user_id = Uuid::new_v4();

        let issued = manager.rotate("lost-token", user_id).await.unwrap();

        assert!(issued.record.replaces_token_hash.is_none());
        assert!(manager.validate(&issued.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_rotate_unknown_rejected_when_strict() {
        let (manager, _) = manager_with(true);
        let result = manager.rotate("lost-token", Uuid::new_v4()).await;

        assert!(matches!(result, Err(TokenError::NotFound)));
    }

    #[tokio::test]
    async fn test_rotate_for_other_user_rejected() {
        let manager = manager();
        let owner = Uuid::new_v4();
        let first = manager.issue(owner).await.unwrap();

        let result = manager.rotate(&first.token, Uuid::new_v4()).await;

        assert!(matches!(result, Err(TokenError::NotFound)));
        assert!(manager.validate(&first.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let (manager, store) = manager_with(false);
        let now = Utc::now();
        let token = generate_refresh_token();
        let expired = RefreshToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: hash_token(&token),
            created_at: now - Duration::days(8),
            expires_at: now - Duration::days(1),
            revoked_at: None,
            replaces_token_hash: None,
        };
        RefreshTokenStore::insert(store.as_ref(), &expired).await.unwrap();

        assert!(matches!(
            manager.validate(&token).await,
            Err(TokenError::ExpiredOrRevoked)
        ));
        assert!(matches!(
            manager.rotate(&token, expired.user_id).await,
            Err(TokenError::ExpiredOrRevoked)
        ));
    }

    #[tokio::test]
    async fn test_revoke_all_for_user() {
        let manager = manager();
        let user_id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let a = manager.issue(user_id).await.unwrap();
        let b = manager.issue(user_id).await.unwrap();
        let c = manager.issue(other).await.unwrap();

        assert_eq!(manager.revoke_all_for_user(user_id).await.unwrap(), 2);
        assert_eq!(manager.revoke_all_for_user(user_id).await.unwrap(), 0);

        assert!(manager.validate(&a.token).await.is_err());
        assert!(manager.validate(&b.token).await.is_err());
        assert!(manager.validate(&c.token).await.is_ok());
    }
}
