//! Password hashing with Argon2

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password using Argon2id
///
/// Each call salts with fresh randomness, so hashing the same password
/// twice yields two different encodings.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Verify a password against a stored hash
///
/// A stored hash that fails to parse counts as a mismatch, not a fault.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed_hash) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "correct-secret";
        let hash = hash_password(password).expect("Failed to hash password");

        assert!(verify_password(password, &hash));
        assert!(!verify_password("wrong-secret", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        let password = "correct-secret";
        let first = hash_password(password).expect("Failed to hash password");
        let second = hash_password(password).expect("Failed to hash password");

        // Fresh salt per call: identical input, distinct encodings
        assert_ne!(first, second);
        assert!(verify_password(password, &first));
        assert!(verify_password(password, &second));
    }

    #[test]
    fn test_malformed_hash_is_mismatch() {
        assert!(!verify_password("anything", "not-a-valid-phc-string"));
        assert!(!verify_password("anything", ""));
    }
}
