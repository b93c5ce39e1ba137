/// JWT Claims structure
///
/// Payload of an access token: identity claims plus the standard
/// registered claims (RFC 7519).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;
use crate::models::User;

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Display name (username)
    pub name: String,
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    /// Unique token id; two tokens minted in the same second still differ
    pub jti: String,
}

impl Claims {
    /// Claims for `user`, valid for `expiry_seconds` from `issued_at`
    pub fn for_user(
        user: &User,
        issued_at: i64,
        expiry_seconds: i64,
        issuer: &str,
        audience: &str,
    ) -> Self {
        Self {
            sub: user.id.to_string(),
            name: user.username.clone(),
            email: user.email.clone(),
            iat: issued_at,
            exp: issued_at + expiry_seconds,
            iss: issuer.to_string(),
            aud: audience.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// Returns error if the subject is not a valid UUID
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| TokenError::Invalid("subject is not a user id".to_string()))
    }

    /// Check if token has expired; a token is dead at exactly `exp`
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() >= self.exp
    }
}
