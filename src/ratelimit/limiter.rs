//! Enforcement glue between strategies, counters and limit handlers.

use chrono::{DateTime, TimeDelta, Utc};
use http::header::{HeaderName, HeaderValue, RETRY_AFTER};
use http::{Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

use crate::error::Result;

use super::counter::{window_start, Counter, InMemoryCounter};
use super::decision::Decision;
use super::request::RequestInfo;
use super::strategy::KeyStrategy;

/// What the limit handler gets to see about an over-quota bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitContext {
    pub key: String,
    pub limit: u64,
    /// Requests already counted in the current window
    pub count: u64,
    pub window: Duration,
    /// Time left until the current window closes
    pub reset_after: Duration,
}

/// Builds the response for a request whose bucket is over quota.
pub trait LimitHandler: Send + Sync {
    fn on_limit(&self, ctx: &LimitContext, strategy: &str) -> Response<String>;
}

impl<F> LimitHandler for F
where
    F: Fn(&LimitContext, &str) -> Response<String> + Send + Sync,
{
    fn on_limit(&self, ctx: &LimitContext, strategy: &str) -> Response<String> {
        self(ctx, strategy)
    }
}

/// Default handler: `429 Too Many Requests` with rate limit headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TooManyRequests;

impl LimitHandler for TooManyRequests {
    fn on_limit(&self, ctx: &LimitContext, _strategy: &str) -> Response<String> {
        let mut resp = Response::new("Too Many Requests".to_string());
        *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;

        let reset_secs = ctx.reset_after.as_secs() + u64::from(ctx.reset_after.subsec_nanos() > 0);
        let headers = resp.headers_mut();
        headers.insert(
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderValue::from(ctx.limit),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from_static("0"),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderValue::from(reset_secs),
        );
        headers.insert(RETRY_AFTER, HeaderValue::from(reset_secs));
        resp
    }
}

/// Result of checking one request against one strategy.
#[derive(Debug)]
pub enum Outcome {
    /// The strategy does not limit this request
    Unlimited,
    /// The request was counted and may proceed
    Allowed {
        key: String,
        limit: u64,
        remaining: u64,
    },
    /// The bucket is over quota; `response` came from the limit handler
    Limited {
        key: String,
        response: Response<String>,
    },
}

impl Outcome {
    pub fn is_limited(&self) -> bool {
        matches!(self, Outcome::Limited { .. })
    }
}

/// Runs one strategy against a fixed-window counter.
///
/// The counter is read before it is incremented, and requests that are
/// already over quota are not counted again.
pub struct RateLimiter {
    strategy: Arc<dyn KeyStrategy>,
    counter: Arc<dyn Counter>,
}

impl RateLimiter {
    pub fn new(strategy: Arc<dyn KeyStrategy>, counter: Arc<dyn Counter>) -> Self {
        Self { strategy, counter }
    }

    /// Pair a strategy with an in-process counter sized for its window.
    pub fn in_memory(strategy: Arc<dyn KeyStrategy>) -> Self {
        let counter = Arc::new(InMemoryCounter::for_window(strategy.base().window));
        Self::new(strategy, counter)
    }

    pub fn strategy(&self) -> &dyn KeyStrategy {
        self.strategy.as_ref()
    }

    /// Check a request against the current window.
    pub async fn check(&self, request: &RequestInfo) -> Result<Outcome> {
        self.check_at(request, Utc::now()).await
    }

    /// Check a request as if it arrived at `now`.
    pub async fn check_at(&self, request: &RequestInfo, now: DateTime<Utc>) -> Result<Outcome> {
        let (key, limit, window) = match self.strategy.decide(request)? {
            Decision::Limited { key, limit, window } => (key, limit, window),
            Decision::Unlimited => return Ok(Outcome::Unlimited),
        };

        let start = window_start(now, window)?;
        let count = self.counter.get(&key, start).await?;

        if count >= limit {
            let reset_after = TimeDelta::from_std(window)
                .ok()
                .and_then(|w| start.checked_add_signed(w))
                .and_then(|end| (end - now).to_std().ok())
                .unwrap_or(window);
            warn!(
                strategy = %self.strategy.name(),
                key = %key,
                count = count,
                limit = limit,
                "Rate limit exceeded"
            );
            let ctx = LimitContext {
                key: key.clone(),
                limit,
                count,
                window,
                reset_after,
            };
            let response = self.strategy.on_limit(&ctx);
            return Ok(Outcome::Limited { key, response });
        }

        self.counter.increment(&key, start).await?;
        let remaining = limit - count - 1;
        trace!(
            strategy = %self.strategy.name(),
            key = %key,
            remaining = remaining,
            "Request counted"
        );
        Ok(Outcome::Allowed {
            key,
            limit,
            remaining,
        })
    }
}
