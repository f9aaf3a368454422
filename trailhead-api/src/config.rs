//! Configuration management using Figment
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: TRAILHEAD_, `__` as section separator)
//! 2. Current working directory: ./config.toml
//! 3. Default values

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Session token configuration
    pub auth: AuthConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Security headers configuration
    #[serde(default)]
    pub security_headers: SecurityHeadersConfig,

    /// Outbound email configuration
    #[serde(default)]
    pub email: EmailConfig,

    /// Payment processor configuration
    pub payments: PaymentsConfig,

    /// Upload storage configuration
    #[serde(default)]
    pub uploads: UploadsConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Environment (development, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Public base URL used in emails and payment redirects
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            port: default_port(),
            log_level: default_log_level(),
            environment: default_environment(),
            public_url: default_public_url(),
        }
    }
}

impl ServiceConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// MongoDB connection URL
    pub url: String,

    /// Database name
    #[serde(default = "default_database_name")]
    pub name: String,
}

/// Session token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: String,

    /// Token lifetime in seconds
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: i64,

    /// Session cookie lifetime in days
    #[serde(default = "default_cookie_lifetime_days")]
    pub cookie_lifetime_days: i64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window per client address
    #[serde(default = "default_rate_limit_max")]
    pub max_requests: u32,

    /// Window length in seconds
    #[serde(default = "default_rate_limit_window")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max(),
            window_secs: default_rate_limit_window(),
        }
    }
}

/// Security headers configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityHeadersConfig {
    /// Master switch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Send Strict-Transport-Security (only honored when TLS terminates here)
    #[serde(default)]
    pub hsts: bool,

    /// HSTS max-age in seconds
    #[serde(default = "default_hsts_max_age")]
    pub hsts_max_age_secs: u64,

    /// X-Frame-Options value
    #[serde(default = "default_x_frame_options")]
    pub x_frame_options: String,

    /// Referrer-Policy value
    #[serde(default = "default_referrer_policy")]
    pub referrer_policy: String,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hsts: false,
            hsts_max_age_secs: default_hsts_max_age(),
            x_frame_options: default_x_frame_options(),
            referrer_policy: default_referrer_policy(),
        }
    }
}

/// Outbound email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Delivery mode: "log" (development) or "http" (provider API)
    #[serde(default = "default_email_mode")]
    pub mode: String,

    /// Provider HTTP endpoint (http mode)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Provider API key (http mode)
    #[serde(default)]
    pub api_key: Option<String>,

    /// From address
    #[serde(default = "default_email_from")]
    pub from: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            mode: default_email_mode(),
            endpoint: None,
            api_key: None,
            from: default_email_from(),
        }
    }
}

/// Payment processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Processor API base URL
    #[serde(default = "default_payments_api_base")]
    pub api_base: String,

    /// Secret API key
    pub secret_key: String,

    /// Shared webhook signing secret
    pub webhook_secret: String,

    /// Charge currency
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// Upload storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    /// Directory images are written under
    #[serde(default = "default_uploads_dir")]
    pub directory: PathBuf,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            directory: default_uploads_dir(),
        }
    }
}

impl Config {
    /// Load configuration from config.toml and the environment.
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("config.toml"))
                .merge(Env::prefixed("TRAILHEAD_").split("__")),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }
}

fn default_service_name() -> String {
    "trailhead-api".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_database_name() -> String {
    "trailhead".to_string()
}

fn default_token_lifetime() -> i64 {
    90 * 24 * 60 * 60
}

fn default_cookie_lifetime_days() -> i64 {
    90
}

fn default_rate_limit_max() -> u32 {
    100
}

fn default_rate_limit_window() -> u64 {
    60 * 60
}

fn default_true() -> bool {
    true
}

fn default_hsts_max_age() -> u64 {
    63072000
}

fn default_x_frame_options() -> String {
    "DENY".to_string()
}

fn default_referrer_policy() -> String {
    "strict-origin-when-cross-origin".to_string()
}

fn default_email_mode() -> String {
    "log".to_string()
}

fn default_email_from() -> String {
    "Trailhead <hello@trailhead.example>".to_string()
}

fn default_payments_api_base() -> String {
    "https://api.stripe.com".to_string()
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("public/img")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Figment {
        Figment::new()
            .merge(("database.url", "mongodb://localhost:27017"))
            .merge(("auth.jwt_secret", "test-secret-test-secret-32-chars!"))
            .merge(("payments.secret_key", "sk_test_123"))
            .merge(("payments.webhook_secret", "whsec_123"))
    }

    #[test]
    fn test_defaults_fill_in() {
        let config = Config::from_figment(minimal()).unwrap();
        assert_eq!(config.service.port, 3000);
        assert_eq!(config.service.environment, "development");
        assert!(!config.service.is_production());
        assert_eq!(config.database.name, "trailhead");
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_secs, 3600);
        assert_eq!(config.email.mode, "log");
        assert_eq!(config.payments.currency, "usd");
    }

    #[test]
    fn test_missing_required_value_fails() {
        let figment = Figment::new().merge(("database.url", "mongodb://localhost:27017"));
        assert!(Config::from_figment(figment).is_err());
    }

    #[test]
    fn test_production_flag() {
        let config =
            Config::from_figment(minimal().merge(("service.environment", "production"))).unwrap();
        assert!(config.service.is_production());
    }
}
