//! Outbound email, interface level only.
//!
//! Delivery is a trait; production posts to a provider HTTP API, development
//! writes the message to the log. Message composition is pure and tested.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::EmailConfig;
use crate::error::{Error, Result};
use crate::models::User;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<()>;
}

/// Development transport: the message goes to the log, nowhere else.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        tracing::info!(%to, %subject, "outbound email (log transport)\n{text}");
        Ok(())
    }
}

/// Provider-API transport.
pub struct HttpMailer {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "text": text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::External(format!(
                "mail provider returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
}

impl EmailService {
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        let mailer: Arc<dyn Mailer> = match config.mode.as_str() {
            "log" => Arc::new(LogMailer),
            "http" => {
                let endpoint = config.endpoint.clone().ok_or_else(|| {
                    Error::Internal("email.endpoint is required in http mode".to_string())
                })?;
                let api_key = config.api_key.clone().ok_or_else(|| {
                    Error::Internal("email.api_key is required in http mode".to_string())
                })?;
                Arc::new(HttpMailer {
                    http: reqwest::Client::new(),
                    endpoint,
                    api_key,
                    from: config.from.clone(),
                })
            }
            other => {
                return Err(Error::Internal(format!("unknown email mode: {other}")));
            }
        };

        Ok(Self { mailer })
    }

    pub async fn send_welcome(&self, user: &User, account_url: &str) -> Result<()> {
        self.mailer
            .send(
                &user.email,
                "Welcome to the Trailhead family!",
                &welcome_body(&user.name, account_url),
            )
            .await
    }

    pub async fn send_password_reset(&self, user: &User, reset_url: &str) -> Result<()> {
        self.mailer
            .send(
                &user.email,
                "Your password reset token (valid for only 10 minutes)",
                &password_reset_body(&user.name, reset_url),
            )
            .await
    }
}

fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

fn welcome_body(name: &str, account_url: &str) -> String {
    format!(
        "Hi {},\n\n\
         Welcome to Trailhead, we're glad to have you!\n\
         Manage your account here: {}\n",
        first_name(name),
        account_url
    )
}

fn password_reset_body(name: &str, reset_url: &str) -> String {
    format!(
        "Hi {},\n\n\
         Forgot your password? Submit a request with your new password to: {}\n\
         If you didn't forget your password, please ignore this email.\n",
        first_name(name),
        reset_url
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_bodies_carry_the_url_and_first_name() {
        let body = welcome_body("Alice Smith", "http://localhost:3000/me");
        assert!(body.contains("Hi Alice,"));
        assert!(body.contains("http://localhost:3000/me"));

        let body = password_reset_body("Bob", "http://localhost:3000/reset/abc");
        assert!(body.contains("http://localhost:3000/reset/abc"));
        assert!(body.contains("10 minutes") || body.contains("ignore this email"));
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        let service = EmailService::from_config(&EmailConfig::default()).unwrap();
        let user = User::new(
            "Alice".into(),
            "alice@example.com".into(),
            "hash".into(),
            Role::User,
        );
        assert!(service.send_welcome(&user, "http://localhost/me").await.is_ok());
    }

    #[test]
    fn test_http_mode_requires_endpoint_and_key() {
        let config = EmailConfig {
            mode: "http".into(),
            ..Default::default()
        };
        assert!(EmailService::from_config(&config).is_err());
    }
}
