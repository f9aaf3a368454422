//! Password reset tokens.
//!
//! The plaintext token is emailed to the user; only its one-way digest is
//! stored, alongside a ten-minute expiry. The reset endpoint looks up by
//! digest-of-supplied-token, so a database leak does not expose usable
//! tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use bson::DateTime;
use chrono::{Duration, Utc};
use rand::RngCore;

/// Reset tokens expire ten minutes after issuance.
pub const RESET_TOKEN_TTL_MINS: i64 = 10;

pub struct ResetToken {
    /// Sent to the user, never stored.
    pub plaintext: String,
    /// Stored on the user record.
    pub digest: String,
    /// Stored expiry.
    pub expires_at: DateTime,
}

/// Generate a fresh high-entropy reset token.
pub fn generate() -> ResetToken {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let plaintext = URL_SAFE_NO_PAD.encode(bytes);

    ResetToken {
        digest: digest(&plaintext),
        plaintext,
        expires_at: DateTime::from_chrono(Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINS)),
    }
}

/// One-way digest of a reset token (hex).
pub fn digest(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_round_trip() {
        let token = generate();
        assert_eq!(digest(&token.plaintext), token.digest);
        assert_ne!(token.plaintext, token.digest);
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate().plaintext, generate().plaintext);
    }

    #[test]
    fn test_expiry_is_about_ten_minutes_out() {
        let token = generate();
        let delta = token.expires_at.timestamp_millis() - Utc::now().timestamp_millis();
        assert!(delta > 9 * 60 * 1000);
        assert!(delta <= 10 * 60 * 1000);
    }

    #[test]
    fn test_digest_is_stable_and_discriminating() {
        assert_eq!(digest("abc"), digest("abc"));
        assert_ne!(digest("abc"), digest("abd"));
    }
}
