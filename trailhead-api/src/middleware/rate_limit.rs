//! Fixed-window rate limiting keyed by client address.
//!
//! Process-local counters (`DashMap`), one window per address, applied to the
//! API routes. Limit decisions are pure over an injected `now` so the window
//! arithmetic is testable.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::{Error, Result};

const HEADER_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const HEADER_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const HEADER_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug, Clone, Copy)]
pub struct Quota {
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u64,
}

struct Window {
    started: Instant,
    count: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    hits: Arc<DashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            hits: Arc::new(DashMap::new()),
        }
    }

    /// Count a hit for `addr` at `now`. `Err` carries the quota for the 429
    /// response headers.
    pub fn check(&self, addr: IpAddr, now: Instant) -> std::result::Result<Quota, Quota> {
        let mut entry = self.hits.entry(addr).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        entry.count += 1;
        let elapsed = now.duration_since(entry.started);
        let quota = Quota {
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.count),
            reset_secs: self.window.saturating_sub(elapsed).as_secs(),
        };

        if entry.count > self.max_requests {
            Err(quota)
        } else {
            Ok(quota)
        }
    }

    pub async fn middleware(
        State(limiter): State<RateLimiter>,
        request: Request<Body>,
        next: Next,
    ) -> Result<Response> {
        let addr = client_addr(&request);

        match limiter.check(addr, Instant::now()) {
            Ok(quota) => {
                let mut response = next.run(request).await;
                apply_headers(&mut response, &quota);
                Ok(response)
            }
            Err(quota) => {
                tracing::warn!(%addr, "rate limit exceeded");
                let mut response = Error::RateLimitExceeded.into_response();
                apply_headers(&mut response, &quota);
                Ok(response)
            }
        }
    }
}

/// Client address: first X-Forwarded-For hop, then X-Real-IP, then the
/// socket peer.
fn client_addr(request: &Request<Body>) -> IpAddr {
    let from_header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    from_header("x-forwarded-for")
        .or_else(|| from_header("x-real-ip"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn apply_headers(response: &mut Response, quota: &Quota) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&quota.limit.to_string()) {
        headers.insert(HEADER_LIMIT, value);
    }
    if let Ok(value) = HeaderValue::from_str(&quota.remaining.to_string()) {
        headers.insert(HEADER_REMAINING, value);
    }
    if let Ok(value) = HeaderValue::from_str(&quota.reset_secs.to_string()) {
        headers.insert(HEADER_RESET, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests: max,
            window_secs,
        })
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_requests_under_the_limit_pass() {
        let limiter = limiter(3, 60);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check(ip(1), now).is_ok());
        }
    }

    #[test]
    fn test_request_over_the_limit_is_blocked() {
        let limiter = limiter(2, 60);
        let now = Instant::now();
        assert!(limiter.check(ip(1), now).is_ok());
        assert!(limiter.check(ip(1), now).is_ok());
        let quota = limiter.check(ip(1), now).unwrap_err();
        assert_eq!(quota.remaining, 0);
    }

    #[test]
    fn test_addresses_are_tracked_independently() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(limiter.check(ip(1), now).is_ok());
        assert!(limiter.check(ip(2), now).is_ok());
        assert!(limiter.check(ip(1), now).is_err());
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = limiter(1, 60);
        let start = Instant::now();
        assert!(limiter.check(ip(1), start).is_ok());
        assert!(limiter.check(ip(1), start).is_err());

        let later = start + Duration::from_secs(61);
        assert!(limiter.check(ip(1), later).is_ok());
    }

    #[test]
    fn test_remaining_counts_down() {
        let limiter = limiter(5, 60);
        let now = Instant::now();
        assert_eq!(limiter.check(ip(1), now).unwrap().remaining, 4);
        assert_eq!(limiter.check(ip(1), now).unwrap().remaining, 3);
    }
}
