/// Password Hashing and Verification
///
/// bcrypt with an embedded random salt. Both operations run on tokio's blocking
/// pool so a slow hash never stalls unrelated requests.

use bcrypt::{hash, verify};

use crate::error::AuthError;

/// bcrypt only looks at the first 72 bytes; longer input is rejected rather
/// than truncated
const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Clone, Debug)]
pub struct PasswordHasher {
    cost: u32,
    /// Verified against when the username is unknown, so both login
    /// failure paths cost one bcrypt verification
    dummy_hash: String,
}

impl PasswordHasher {
    /// # Errors
    /// Returns error if `cost` is outside bcrypt's accepted range (4..=31)
    pub fn new(cost: u32) -> Result<Self, AuthError> {
        let dummy_hash = hash("bloodwave-dummy-password", cost)
            .map_err(|e| AuthError::Internal(format!("Password hasher setup failed: {}", e)))?;
        Ok(Self { cost, dummy_hash })
    }

    /// Hash a plaintext password. Every call yields a different hash.
    ///
    /// # Errors
    /// - `InvalidInput` if the password exceeds the maximum length
    /// - `Internal` if bcrypt fails or the blocking task is lost
    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::InvalidInput(format!(
                "password is too long (maximum {} bytes)",
                MAX_PASSWORD_BYTES
            )));
        }

        let password = password.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || hash(password, cost))
            .await
            .map_err(|e| AuthError::Internal(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Check a plaintext password against a stored hash.
    ///
    /// A malformed stored hash counts as a mismatch, and so does a password
    /// too long to have been hashed.
    pub async fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, AuthError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Ok(false);
        }

        let password = password.to_owned();
        let stored_hash = stored_hash.to_owned();
        let matched = tokio::task::spawn_blocking(move || verify(password, &stored_hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Password verification task failed: {}", e)))?;

        match matched {
            Ok(ok) => Ok(ok),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash could not be parsed");
                Ok(false)
            }
        }
    }

    /// Burn one verification for a user that does not exist
    pub async fn verify_dummy(&self, password: &str) -> Result<(), AuthError> {
        self.verify(password, &self.dummy_hash).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4).expect("cost 4 is valid")
    }

    #[tokio::test]
    async fn test_hash_password() {
        let password = "pw123!";
        let hashed = hasher().hash(password).await.expect("Failed to hash password");

        assert_ne!(password, hashed);
        assert!(hashed.starts_with("$2"));
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let hasher = hasher();
        let first = hasher.hash("same-input").await.unwrap();
        let second = hasher.hash("same-input").await.unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_verify_password() {
        let hasher = hasher();
        let hashed = hasher.hash("ValidPassword123").await.unwrap();

        assert!(hasher.verify("ValidPassword123", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_wrong_password() {
        let hasher = hasher();
        let hashed = hasher.hash("ValidPassword123").await.unwrap();

        assert!(!hasher.verify("WrongPassword123", &hashed).await.unwrap());
        assert!(!hasher.verify("", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_hash_is_mismatch() {
        assert!(!hasher().verify("anything", "not-a-bcrypt-hash").await.unwrap());
    }

    #[tokio::test]
    async fn test_too_long_password() {
        let long_password = "a".repeat(MAX_PASSWORD_BYTES + 1);
        let result = hasher().hash(&long_password).await;

        assert!(matches!(result, Err(AuthError::InvalidInput(_))));
        assert!(hasher().hash(&"a".repeat(MAX_PASSWORD_BYTES)).await.is_ok());
    }

    #[tokio::test]
    async fn test_shared_prefix_does_not_verify() {
        let hasher = hasher();
        let prefix = "x".repeat(MAX_PASSWORD_BYTES);
        let stored = hasher.hash(&prefix).await.unwrap();

        let guess = format!("{}attacker-guess", prefix);
        assert!(!hasher.verify(&guess, &stored).await.unwrap());
        assert!(hasher.hash(&format!("{}correct-suffix", prefix)).await.is_err());
    }

    #[tokio::test]
    async fn test_multibyte_limit_counts_bytes() {
        // 25 three-byte characters: 25 chars, 75 bytes
        let password = "가".repeat(25);
        assert!(hasher().hash(&password).await.is_err());
    }

    #[tokio::test]
    async fn test_verify_dummy() {
        assert!(hasher().verify_dummy("whatever").await.is_ok());
    }

    #[test]
    fn test_invalid_cost() {
        assert!(PasswordHasher::new(2).is_err());
    }
}
