//! User identity: roles, soft delete, password lifecycle timestamps.

use bson::{oid::ObjectId, DateTime};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Fixed role set. Ordering is not meaningful; authorization is an explicit
/// membership check against an allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    /// Pure authorization predicate used by the role-guard middleware.
    pub fn is_any_of(self, allowed: &[Role]) -> bool {
        allowed.contains(&self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub name: String,

    /// Stored lowercase; unique index on the collection.
    pub email: String,

    #[serde(default = "default_photo")]
    pub photo: String,

    #[serde(default)]
    pub role: Role,

    /// Argon2 PHC string. Never exposed: responses go through [`UserResponse`].
    pub password: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_changed_at: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_expires: Option<DateTime>,

    /// Soft-delete flag; default queries scope to `active != false`.
    #[serde(default = "default_active")]
    pub active: bool,

    pub created_at: DateTime,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String, role: Role) -> Self {
        Self {
            id: ObjectId::new(),
            name,
            email: email.to_lowercase(),
            photo: default_photo(),
            role,
            password: password_hash,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: DateTime::now(),
        }
    }

    /// True when the password changed after a token with the given issued-at
    /// was minted, which invalidates that token.
    pub fn changed_password_after(&self, token_iat_secs: i64) -> bool {
        match self.password_changed_at {
            Some(changed_at) => token_iat_secs < changed_at.timestamp_millis() / 1000,
            None => false,
        }
    }

    /// Stamp for `password_changed_at`, backdated one second so a token
    /// minted in the same request (persistence can be slower than token
    /// issuance) stays valid.
    pub fn password_changed_stamp() -> DateTime {
        DateTime::from_chrono(Utc::now() - chrono::Duration::seconds(1))
    }
}

fn default_photo() -> String {
    "default.jpg".to_string()
}

fn default_active() -> bool {
    true
}

/// Client-facing view of a user. Password material and bookkeeping fields
/// never appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_hex(),
            name: user.name,
            email: user.email,
            photo: user.photo,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 120, message = "Please tell us your name!"))]
    pub name: String,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 8, max = 64, message = "Please provide a password of at least 8 characters"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirm: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, max = 64, message = "Please provide a password of at least 8 characters"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirm: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    pub password_current: String,

    #[validate(length(min = 8, max = 64, message = "Please provide a password of at least 8 characters"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirm: String,
}

/// Self-service profile update; everything else is filtered out before this
/// is ever deserialized.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
}

/// Admin-side update; not a password route.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,

    pub role: Option<Role>,

    pub active: Option<bool>,
}
