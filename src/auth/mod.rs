/// Authentication module
///
/// Password hashing, access token issuance/validation, refresh token
/// management, and the auth core that orchestrates them.

mod claims;
mod jwt;
mod password;
mod refresh_token;
mod response;
mod service;

pub use claims::Claims;
pub use jwt::{AccessToken, AccessTokenIssuer};
pub use password::PasswordHasher;
pub use refresh_token::{generate_refresh_token, hash_token, IssuedRefreshToken, RefreshTokenManager};
pub use response::{AuthResponse, UserSummary};
pub use service::{AuthService, AuthSession};
