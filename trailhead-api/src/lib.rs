//! # trailhead-api
//!
//! Tour booking platform: a JSON API under `/api/v1` plus server-rendered
//! pages, in front of a document database.
//!
//! The interesting part is the request pipeline: security headers, per-IP
//! rate limiting, operator-injection sanitization, token authentication with
//! role guards, generic CRUD handler cores instantiated per resource, and a
//! central error type that renders JSON for the API and an error page for
//! browser traffic.

pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod handlers;
pub mod media;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod query;
pub mod repository;
pub mod routes;
pub mod state;
pub mod telemetry;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::state::AppState;
}
