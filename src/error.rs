/// Error Handling Module
///
/// Layered error kinds for the whole application:
/// 1. Collaborator errors (`StoreError`)
/// 2. Token component errors (`TokenError`)
/// 3. User-facing authentication outcomes (`AuthError`)
/// 4. Request validation (`ValidationError`)
/// 5. HTTP mapping (`AppError`) with structured logging context

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

use crate::auth::AuthResponse;

/// ============================================================================
/// 1. STORAGE COLLABORATOR ERRORS
/// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write; carries the field name
    #[error("duplicate {0}")]
    UniqueViolation(&'static str),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => match db_err.constraint() {
                Some(name) if name.contains("username") => StoreError::UniqueViolation("username"),
                Some(name) if name.contains("email") => StoreError::UniqueViolation("email"),
                Some(name) if name.contains("token_hash") => StoreError::UniqueViolation("token"),
                _ => StoreError::Database(err.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

/// ============================================================================
/// 2. TOKEN ERRORS
/// ============================================================================

#[derive(Debug, Error)]
pub enum TokenError {
    /// No refresh token record matches the presented string
    #[error("refresh token not found")]
    NotFound,
    #[error("refresh token expired or revoked")]
    ExpiredOrRevoked,
    #[error("access token expired")]
    Expired,
    #[error("invalid access token: {0}")]
    Invalid(String),
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// ============================================================================
/// 3. AUTHENTICATION OUTCOMES
/// ============================================================================

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailTaken,
    /// Same shape for unknown username and wrong password
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("User account is inactive")]
    AccountInactive,
    #[error("Invalid or expired refresh token")]
    InvalidOrExpiredRefreshToken,
    #[error("User not found")]
    UserNotFound,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Caller-visible message; internal details stay in the logs
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::UsernameTaken | AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::InvalidOrExpiredRefreshToken
            | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthError::AccountInactive => StatusCode::FORBIDDEN,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Storage failure in auth core");
        AuthError::Internal(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::NotFound | TokenError::ExpiredOrRevoked => {
                AuthError::InvalidOrExpiredRefreshToken
            }
            TokenError::Store(e) => e.into(),
            other => {
                tracing::error!(error = %other, "Token failure in auth core");
                AuthError::Internal(other.to_string())
            }
        }
    }
}

/// ============================================================================
/// 4. REQUEST VALIDATION
/// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{0} is empty")]
    EmptyField(String),
    #[error("{0} is too long (maximum {1} characters)")]
    TooLong(String, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(String),
    #[error("{0} contains suspicious content")]
    SuspiciousContent(String),
    #[error("{0} is out of range")]
    OutOfRange(String),
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        AuthError::InvalidInput(err.to_string())
    }
}

/// ============================================================================
/// 5. HTTP-FACING ERROR TYPE
/// ============================================================================

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error body for non-auth endpoints
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = match self {
            AppError::Auth(e) => (e.status_code(), "AUTH_ERROR", e.client_message()),
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Store(StoreError::UniqueViolation(_)) => {
                (StatusCode::CONFLICT, "DUPLICATE_ENTRY", self.to_string())
            }
            AppError::Store(StoreError::Unavailable(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Database service temporarily unavailable".to_string(),
            ),
            AppError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database error occurred".to_string(),
            ),
        };

        let body = ErrorResponse::new(
            request_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );
        (status, body)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Auth(AuthError::Internal(msg)) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
            AppError::Store(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Unauthorized(msg) | AppError::NotFound(msg) => {
                tracing::info!(request_id = request_id, error = %msg, "Request rejected");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        // Auth failures keep the uniform {success, message} shape
        if let AppError::Auth(e) = self {
            return HttpResponse::build(e.status_code()).json(AuthResponse::failure(e));
        }

        let (status, body) = <Self as ErrorHandler>::error_response(self, &request_id);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(e) => e.status_code(),
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::UniqueViolation(_)) => StatusCode::CONFLICT,
            AppError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// ============================================================================
/// 6. ERROR CONTEXT
/// ============================================================================

/// Per-operation context carried into log events
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &AuthError) {
        match error {
            AuthError::Internal(_) => tracing::error!(
                request_id = %self.request_id,
                operation = %self.operation,
                user_id = ?self.user_id,
                error = %error,
                "Operation failed"
            ),
            _ => tracing::warn!(
                request_id = %self.request_id,
                operation = %self.operation,
                user_id = ?self.user_id,
                error = %error,
                "Operation rejected"
            ),
        }
    }
}
