use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::ApiError;
use crate::middleware::identity::Identity;
use crate::state::AppState;

/// Request class for rate limiting. Streaming chat is the most expensive,
/// thread creation the easiest to abuse, everything else shares one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateClass {
    Chat,
    Thread,
    General,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start_epoch_secs: u64,
    count: u32,
}

/// Window reset instant as RFC 3339, for the `X-RateLimit-Reset` header.
pub fn format_reset(reset_epoch_secs: u64) -> String {
    chrono::DateTime::from_timestamp(reset_epoch_secs as i64, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

/// Decision for an allowed request, used to fill response headers.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub remaining: u32,
    pub reset_epoch_secs: u64,
}

/// Fixed-window per-identity rate limiter.
///
/// Counters live in memory; restarting the server resets all windows.
pub struct RateLimiter {
    windows: DashMap<(String, RateClass), Window>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    fn limit_for(&self, class: RateClass) -> u32 {
        match class {
            RateClass::Chat => self.config.chat_limit,
            RateClass::Thread => self.config.thread_limit,
            RateClass::General => self.config.general_limit,
        }
    }

    pub fn check(&self, identity: &str, class: RateClass) -> Result<RateDecision, ApiError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.check_at(identity, class, now)
    }

    fn check_at(
        &self,
        identity: &str,
        class: RateClass,
        now_epoch_secs: u64,
    ) -> Result<RateDecision, ApiError> {
        let limit = self.limit_for(class);
        let window_secs = self.config.window_secs;
        let key = (identity.to_string(), class);

        let mut entry = self.windows.entry(key).or_insert(Window {
            start_epoch_secs: now_epoch_secs,
            count: 0,
        });

        if now_epoch_secs >= entry.start_epoch_secs + window_secs {
            entry.start_epoch_secs = now_epoch_secs;
            entry.count = 0;
        }

        let reset_epoch_secs = entry.start_epoch_secs + window_secs;

        if entry.count >= limit {
            return Err(ApiError::RateLimited {
                retry_after_secs: reset_epoch_secs.saturating_sub(now_epoch_secs),
                reset_epoch_secs,
            });
        }

        entry.count += 1;
        Ok(RateDecision {
            remaining: limit - entry.count,
            reset_epoch_secs,
        })
    }
}

pub async fn limit_chat(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(state, RateClass::Chat, req, next).await
}

pub async fn limit_thread(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(state, RateClass::Thread, req, next).await
}

pub async fn limit_general(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(state, RateClass::General, req, next).await
}

/// Runs after the identity layer, so a missing extension is a wiring bug.
async fn enforce(
    state: AppState,
    class: RateClass,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .cloned()
        .ok_or(ApiError::Unauthorized)?;

    let decision = state.limiter.check(&identity.0, class)?;

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&format_reset(decision.reset_epoch_secs)) {
        headers.insert("x-ratelimit-reset", v);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            window_secs: 60,
            chat_limit: 3,
            thread_limit: 2,
            general_limit: 5,
        })
    }

    #[test]
    fn test_requests_within_limit_pass() {
        let limiter = limiter();
        for i in 0..3 {
            let decision = limiter.check_at("u1", RateClass::Chat, 100).unwrap();
            assert_eq!(decision.remaining, 2 - i);
        }
    }

    #[test]
    fn test_request_over_limit_rejected_with_reset() {
        let limiter = limiter();
        for _ in 0..3 {
            limiter.check_at("u1", RateClass::Chat, 100).unwrap();
        }
        let err = limiter.check_at("u1", RateClass::Chat, 130).unwrap_err();
        match err {
            ApiError::RateLimited {
                retry_after_secs,
                reset_epoch_secs,
            } => {
                assert_eq!(reset_epoch_secs, 160);
                assert_eq!(retry_after_secs, 30);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = limiter();
        for _ in 0..3 {
            limiter.check_at("u1", RateClass::Chat, 100).unwrap();
        }
        assert!(limiter.check_at("u1", RateClass::Chat, 161).is_ok());
    }

    #[test]
    fn test_reset_header_is_rfc3339() {
        assert_eq!(format_reset(1_700_000_000), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn test_classes_and_identities_are_independent() {
        let limiter = limiter();
        for _ in 0..3 {
            limiter.check_at("u1", RateClass::Chat, 100).unwrap();
        }
        assert!(limiter.check_at("u1", RateClass::General, 100).is_ok());
        assert!(limiter.check_at("u2", RateClass::Chat, 100).is_ok());
    }
}
