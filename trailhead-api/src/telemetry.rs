//! Tracing initialization. `RUST_LOG` wins over the configured level.

use tracing_subscriber::EnvFilter;

use crate::config::Config;

pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
