/// Authentication Routes
///
/// Thin adapter over the auth core: register, login, token refresh and logout.
/// Every response, success or failure, uses the `AuthResponse` shape.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::{AuthResponse, AuthService, Claims};
use crate::error::{AppError, AuthError};
use crate::routes::authenticated_user;
use crate::validators::{validate_email, validate_username};

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// POST /api/auth/register
///
/// # Errors
/// - 400: Blank or malformed username, password or email
/// - 409: Username or email already registered
/// - 500: Internal server error
pub async fn register(
    form: web::Json<RegisterRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    if form.username.trim().is_empty() || form.password.trim().is_empty() {
        return Err(AuthError::InvalidInput("Username and password required".to_string()).into());
    }
    let username = validate_username(&form.username).map_err(AuthError::from)?;
    let email = validate_email(&form.email).map_err(AuthError::from)?;

    let session = auth.register(&username, &form.password, &email).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::session("User registered successfully", session)))
}

/// POST /api/auth/login
///
/// # Errors
/// - 400: Blank username or password
/// - 401: Invalid credentials (same body for unknown user and wrong password)
/// - 403: Account is inactive
pub async fn login(
    form: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let session = auth.login(&form.username, &form.password).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::session("Login successful", session)))
}

/// POST /api/auth/refresh
///
/// Rotates the presented refresh token: the response carries a new pair and
/// the presented token can never be redeemed again.
///
/// # Errors
/// - 401: Invalid, expired, revoked or already-used refresh token
/// - 403: Associated account is inactive
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    if form.refresh_token.trim().is_empty() {
        return Err(AuthError::InvalidOrExpiredRefreshToken.into());
    }

    let session = auth.refresh(&form.refresh_token).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::session("Token refreshed successfully", session)))
}

/// POST /api/auth/logout
///
/// **Requires valid JWT access token.** Revokes all of the caller's refresh
/// tokens; the access token itself stays valid until it expires.
pub async fn logout(
    claims: web::ReqData<Claims>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user_id = authenticated_user(&claims)?;
    auth.logout(user_id).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::message("Logged out successfully")))
}
