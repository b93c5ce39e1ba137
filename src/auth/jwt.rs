/// JWT Token Generation and Validation
///
/// HS256 access tokens signed with a key that is fixed for the lifetime of
/// the issuer. Validation is stateless and never touches storage.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::TokenError;
use crate::models::User;

/// A signed access token and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and validates access tokens.
///
/// Cheap to clone; clones share the same keys.
#[derive(Clone)]
pub struct AccessTokenIssuer {
    keys: Arc<Keys>,
    issuer: String,
    audience: String,
    expiry_seconds: i64,
}

impl AccessTokenIssuer {
    pub fn new(config: &JwtSettings) -> Self {
        let secret = config.secret.as_bytes();
        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            }),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            expiry_seconds: config.access_token_expiry,
        }
    }

    /// Generate a new access token for a user
    ///
    /// # Errors
    /// Returns error if token signing fails
    pub fn issue(&self, user: &User) -> Result<AccessToken, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims::for_user(user, now, self.expiry_seconds, &self.issuer, &self.audience);
        self.sign(&claims)
    }

    /// Sign arbitrary claims with this issuer's key
    pub(crate) fn sign(&self, claims: &Claims) -> Result<AccessToken, TokenError> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| TokenError::Signing("expiry out of range".to_string()))?;

        Ok(AccessToken { token, expires_at })
    }

    /// Validate and extract claims from an access token
    ///
    /// Checks signature, issuer, audience and expiry with no clock-skew
    /// allowance.
    ///
    /// # Errors
    /// - `Expired` if the token is past its expiry
    /// - `Invalid` if it is malformed, tampered with, or minted for another
    ///   issuer/audience
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let claims = decode::<Claims>(token, &self.keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    tracing::warn!("JWT validation error: {}", e);
                    TokenError::Invalid(e.to_string())
                }
            })?;

        // The library still accepts a token at exactly `exp`
        if claims.is_expired() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
