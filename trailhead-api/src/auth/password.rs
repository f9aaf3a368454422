//! Password hashing using Argon2id.
//!
//! Hashes are PHC strings, self-describing for verification. Verification
//! uses constant-time comparison.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as Argon2Hasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

use crate::error::{Error, Result};

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        // OWASP-recommended Argon2id parameters: 19 MiB, 2 iterations.
        let params =
            Params::new(19 * 1024, 2, 1, None).expect("static Argon2 parameters are valid");
        Self { params }
    }
}

impl PasswordHasher {
    /// Hash a password into a PHC string.
    pub fn hash(&self, password: &str) -> Result<String> {
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("Failed to hash password: {e}")))?;

        Ok(hash.to_string())
    }

    /// Verify a password against a stored hash.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Internal(format!("Invalid password hash format: {e}")))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Internal(format!("Password verification failed: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::default();
        let hash = hasher.hash("test-password-123").unwrap();
        assert!(hash.starts_with("$argon2id$"));

        assert!(hasher.verify("test-password-123", &hash).unwrap());
        assert!(!hasher.verify("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_password_too_short() {
        let hasher = PasswordHasher::default();
        assert!(matches!(hasher.hash("short"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_different_salts_for_same_password() {
        let hasher = PasswordHasher::default();
        let first = hasher.hash("test-password-123").unwrap();
        let second = hasher.hash("test-password-123").unwrap();
        assert_ne!(first, second);
        assert!(hasher.verify("test-password-123", &first).unwrap());
        assert!(hasher.verify("test-password-123", &second).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let hasher = PasswordHasher::default();
        assert!(hasher.verify("password", "not-a-phc-string").is_err());
    }
}
