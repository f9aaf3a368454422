//! Session token signing and verification (HS256).
//!
//! Tokens carry the user id, issuance time, and expiry. Password changes
//! invalidate earlier tokens via the issued-at comparison in the auth
//! middleware; no revocation list is kept.

use std::sync::Arc;

use bson::oid::ObjectId;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::{AuthConfig, ServiceConfig};
use crate::error::Result;

pub const SESSION_COOKIE: &str = "jwt";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id (hex).
    pub sub: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    validation: Validation,
    lifetime_secs: i64,
}

impl SessionKeys {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry decisions are already second-granular; no leeway.
        validation.leeway = 0;

        Self {
            encoding: Arc::new(EncodingKey::from_secret(config.jwt_secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(config.jwt_secret.as_bytes())),
            validation,
            lifetime_secs: config.token_lifetime_secs,
        }
    }

    /// Issue a token for the given user.
    pub fn sign(&self, user_id: &ObjectId) -> Result<String> {
        self.sign_issued_at(user_id, Utc::now().timestamp())
    }

    pub(crate) fn sign_issued_at(&self, user_id: &ObjectId, iat: i64) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_hex(),
            iat,
            exp: iat + self.lifetime_secs,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify a token. Missing/malformed/expired/bad-signature all surface as
    /// `Unauthorized` via the error conversion.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

/// Session cookie: http-only, whole-site, expiring; `Secure` only in
/// production where transport is TLS.
pub fn session_cookie(token: &str, auth: &AuthConfig, service: &ServiceConfig) -> String {
    let max_age = auth.cookie_lifetime_days * 24 * 60 * 60;
    let mut cookie = format!("{SESSION_COOKIE}={token}; Path=/; Max-Age={max_age}; HttpOnly");
    if service.is_production() {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Logout overwrites the session cookie with a short-lived dummy value.
pub fn logout_cookie() -> String {
    format!("{SESSION_COOKIE}=logged-out; Path=/; Max-Age=10; HttpOnly")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn keys(lifetime: i64) -> SessionKeys {
        SessionKeys::new(&AuthConfig {
            jwt_secret: "a-test-secret-of-decent-length!!".into(),
            token_lifetime_secs: lifetime,
            cookie_lifetime_days: 90,
        })
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let keys = keys(3600);
        let user_id = ObjectId::new();
        let token = keys.sign(&user_id).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_hex());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let keys = keys(60);
        let user_id = ObjectId::new();
        let stale = keys
            .sign_issued_at(&user_id, Utc::now().timestamp() - 3600)
            .unwrap();
        let err = keys.verify(&stale).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let keys = keys(3600);
        let mut token = keys.sign(&ObjectId::new()).unwrap();
        // Flip a character in the signature segment.
        let flipped = if token.ends_with('a') { 'b' } else { 'a' };
        token.pop();
        token.push(flipped);
        assert!(matches!(keys.verify(&token), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let ours = keys(3600);
        let theirs = SessionKeys::new(&AuthConfig {
            jwt_secret: "a-completely-different-secret!!!".into(),
            token_lifetime_secs: 3600,
            cookie_lifetime_days: 90,
        });
        let token = theirs.sign(&ObjectId::new()).unwrap();
        assert!(ours.verify(&token).is_err());
    }

    #[test]
    fn test_cookie_attributes() {
        let auth = AuthConfig {
            jwt_secret: "s".into(),
            token_lifetime_secs: 3600,
            cookie_lifetime_days: 90,
        };
        let dev = ServiceConfig {
            name: "t".into(),
            port: 3000,
            log_level: "info".into(),
            environment: "development".into(),
            public_url: "http://localhost:3000".into(),
        };
        let cookie = session_cookie("abc", &auth, &dev);
        assert!(cookie.starts_with("jwt=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));

        let prod = ServiceConfig {
            environment: "production".into(),
            ..dev
        };
        assert!(session_cookie("abc", &auth, &prod).contains("Secure"));
    }

    #[test]
    fn test_logout_cookie_expires_quickly() {
        let cookie = logout_cookie();
        assert!(cookie.contains("Max-Age=10"));
        assert!(cookie.starts_with("jwt=logged-out"));
    }
}
