//! Process-wide application state: configuration, connection handles, and
//! the collaborators established once at startup. Cloned per request; never
//! mutated after boot (the rate-limit counters are interior-mutable by
//! design).

use std::sync::Arc;

use crate::auth::{PasswordHasher, SessionKeys};
use crate::config::Config;
use crate::db::{self, Collections};
use crate::email::EmailService;
use crate::error::Result;
use crate::middleware::rate_limit::RateLimiter;
use crate::models::{Booking, Review, Tour, User};
use crate::payments::PaymentClient;
use crate::repository::Repository;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Collections,
    pub hasher: PasswordHasher,
    pub sessions: SessionKeys,
    pub email: EmailService,
    pub payments: PaymentClient,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let database = db::connect(&config.database).await?;
        let collections = Collections::new(&database);
        db::ensure_indexes(&collections).await?;

        let sessions = SessionKeys::new(&config.auth);
        let email = EmailService::from_config(&config.email)?;
        let payments = PaymentClient::new(config.payments.clone());
        let rate_limiter = RateLimiter::new(&config.rate_limit);

        Ok(Self {
            config: Arc::new(config),
            db: collections,
            hasher: PasswordHasher::default(),
            sessions,
            email,
            payments,
            rate_limiter,
        })
    }

    pub fn users(&self) -> Repository<User> {
        Repository::new(self.db.users.clone())
    }

    pub fn tours(&self) -> Repository<Tour> {
        Repository::new(self.db.tours.clone())
    }

    pub fn reviews(&self) -> Repository<Review> {
        Repository::new(self.db.reviews.clone())
    }

    pub fn bookings(&self) -> Repository<Booking> {
        Repository::new(self.db.bookings.clone())
    }
}
