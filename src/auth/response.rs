/// Uniform result shape returned by every auth operation.
///
/// `{success, message, token?, refreshToken?, expiresAt?, user?}`; absent
/// fields are omitted from the JSON body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::service::AuthSession;
use crate::error::AuthError;
use crate::models::User;

/// Public view of a user; never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access token expiry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

impl AuthResponse {
    /// Success carrying a freshly issued token pair
    pub fn session(message: &str, session: AuthSession) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            token: Some(session.access_token.token),
            refresh_token: Some(session.refresh_token.token),
            expires_at: Some(session.access_token.expires_at),
            refresh_token_expires_at: Some(session.refresh_token.record.expires_at),
            user: Some(session.user),
        }
    }

    /// Success without tokens (logout)
    pub fn message(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            token: None,
            refresh_token: None,
            expires_at: None,
            refresh_token_expires_at: None,
            user: None,
        }
    }

    pub fn failure(error: &AuthError) -> Self {
        Self {
            success: false,
            ..Self::message(&error.client_message())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_omits_token_fields() {
        let body = serde_json::to_value(AuthResponse::failure(&AuthError::InvalidCredentials))
            .unwrap();

        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid username or password");
        assert!(body.get("token").is_none());
        assert!(body.get("refreshToken").is_none());
        assert!(body.get("user").is_none());
    }

    #[test]
    fn test_internal_failure_is_sanitized() {
        let response = AuthResponse::failure(&AuthError::Internal("pool timed out".into()));
        assert_eq!(response.message, "Internal server error");
    }

    #[test]
    fn test_user_summary_has_no_hash() {
        let user = User::new("alice".into(), "a@x.com".into(), "$2b$secret".into());
        let body = serde_json::to_string(&UserSummary::from(&user)).unwrap();

        assert!(body.contains("alice"));
        assert!(!body.contains("$2b$secret"));
    }
}
