/// Auth Core
///
/// Orchestrates the password hasher, the access token issuer and the refresh
/// token manager over the credential store. Every operation is an
/// independent unit of work; all shared state lives in the stores.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::jwt::{AccessToken, AccessTokenIssuer};
use crate::auth::password::PasswordHasher;
use crate::auth::refresh_token::{IssuedRefreshToken, RefreshTokenManager};
use crate::auth::response::UserSummary;
use crate::error::{AuthError, ErrorContext, StoreError};
use crate::models::User;
use crate::store::UserStore;

/// A freshly issued token pair and who it belongs to
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: UserSummary,
    pub access_token: AccessToken,
    pub refresh_token: IssuedRefreshToken,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    refresh_tokens: RefreshTokenManager,
    access_tokens: AccessTokenIssuer,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: RefreshTokenManager,
        access_tokens: AccessTokenIssuer,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            access_tokens,
            hasher,
        }
    }

    pub fn access_tokens(&self) -> &AccessTokenIssuer {
        &self.access_tokens
    }

    /// Create an account and open its first session.
    ///
    /// # Errors
    /// - `InvalidInput` if username or password is blank
    /// - `UsernameTaken` / `EmailTaken` on collision, including a collision
    ///   with a concurrent registration
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<AuthSession, AuthError> {
        let context = ErrorContext::new("user_registration");
        self.try_register(username, password, email)
            .await
            .inspect_err(|e| context.log_error(e))
    }

    async fn try_register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<AuthSession, AuthError> {
        if username.trim().is_empty() || password.trim().is_empty() {
            return Err(AuthError::InvalidInput(
                "Username and password required".to_string(),
            ));
        }

        if self.users.find_by_username(username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hasher.hash(password).await?;
        let user = User::new(username.to_string(), email.to_string(), password_hash);

        // The lookups above race with other registrations; the store has the last word
        self.users.insert(&user).await.map_err(|e| match e {
            StoreError::UniqueViolation("username") => AuthError::UsernameTaken,
            StoreError::UniqueViolation("email") => AuthError::EmailTaken,
            other => other.into(),
        })?;

        let session = self.open_session(&user).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User registered successfully");
        Ok(session)
    }

    /// Authenticate with username and password and open a new session.
    ///
    /// # Errors
    /// - `InvalidCredentials` for an unknown username, a wrong password or
    ///   blank input, indistinguishably
    /// - `AccountInactive` if the account has been deactivated
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession, AuthError> {
        let context = ErrorContext::new("user_login");
        self.try_login(username, password)
            .await
            .inspect_err(|e| context.log_error(e))
    }

    async fn try_login(&self, username: &str, password: &str) -> Result<AuthSession, AuthError> {
        let user = match self.users.find_by_username(username).await? {
            Some(user) if !password.is_empty() => user,
            _ => {
                self.hasher.verify_dummy(password).await?;
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        let session = self.open_session(&user).await?;
        tracing::info!(user_id = %user.id, "Login successful");
        Ok(session)
    }

    /// Revoke every refresh token of `user_id`.
    ///
    /// Access tokens already handed out stay valid until their own expiry.
    /// Returns how many refresh tokens were newly revoked; zero is not an error.
    pub async fn logout(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let context = ErrorContext::new("user_logout").with_user_id(user_id.to_string());
        let revoked = self
            .refresh_tokens
            .revoke_all_for_user(user_id)
            .await
            .map_err(AuthError::from)
            .inspect_err(|e| context.log_error(e))?;

        tracing::info!(user_id = %user_id, revoked, "Logged out successfully");
        Ok(revoked)
    }

    /// Redeem a refresh token for a new token pair; the presented token dies.
    ///
    /// # Errors
    /// - `InvalidOrExpiredRefreshToken` if the token is unknown, revoked,
    ///   expired, or lost a race against a concurrent refresh
    /// - `UserNotFound` if the owner no longer exists
    /// - `AccountInactive` if the owner has been deactivated
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let context = ErrorContext::new("token_refresh");
        self.try_refresh(refresh_token)
            .await
            .inspect_err(|e| context.log_error(e))
    }

    async fn try_refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let record = self.refresh_tokens.validate(refresh_token).await?;

        let user = self
            .users
            .find_by_id(record.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        let successor = self.refresh_tokens.rotate(refresh_token, user.id).await?;
        let access_token = self.access_tokens.issue(&user)?;

        tracing::info!(user_id = %user.id, "Token refreshed successfully");
        Ok(AuthSession {
            user: UserSummary::from(&user),
            access_token,
            refresh_token: successor,
        })
    }

    /// Flip the account to inactive and end all of its sessions
    ///
    /// # Errors
    /// `UserNotFound` if no such user exists
    pub async fn deactivate_account(&self, user_id: Uuid) -> Result<(), AuthError> {
        let context = ErrorContext::new("account_deactivation").with_user_id(user_id.to_string());
        let result = async {
            let mut user = self
                .users
                .find_by_id(user_id)
                .await?
                .ok_or(AuthError::UserNotFound)?;
            user.is_active = false;
            self.users.update(&user).await?;
            self.refresh_tokens.revoke_all_for_user(user_id).await?;
            Ok::<(), AuthError>(())
        }
        .await;

        match &result {
            Ok(()) => tracing::info!(user_id = %user_id, "Account deactivated"),
            Err(e) => context.log_error(e),
        }
        result
    }

    async fn open_session(&self, user: &User) -> Result<AuthSession, AuthError> {
        let refresh_token = self.refresh_tokens.issue(user.id).await?;
        let access_token = self.access_tokens.issue(user)?;
        Ok(AuthSession {
            user: UserSummary::from(user),
            access_token,
            refresh_token,
        })
    }
}
