//! Cross-cutting request middleware, layered in `routes.rs`.

pub mod auth;
pub mod error_page;
pub mod rate_limit;
pub mod sanitize;
pub mod security_headers;

pub use auth::{protect, restrict_to, CurrentUser, OptionalUser};
