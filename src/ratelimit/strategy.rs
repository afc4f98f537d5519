//! The contract every classification strategy implements.

use http::Response;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{KeyclassError, Result};

use super::decision::Decision;
use super::filter::{TargetFilter, TargetFilterConfig};
use super::limiter::{LimitContext, LimitHandler, TooManyRequests};
use super::request::RequestInfo;

/// A request classifier.
///
/// Implementations hold only read-only configuration, so `decide` can run
/// concurrently for many requests.
pub trait KeyStrategy: std::fmt::Debug + Send + Sync {
    /// Stable identifier used in logs and passed to the limit handler.
    fn name(&self) -> &str;

    /// Base values and target filter shared by all strategies.
    fn base(&self) -> &StrategyBase;

    /// Classify a request.
    ///
    /// Errors are reserved for requests that cannot be classified at all;
    /// "not subject to a quota" is [`Decision::Unlimited`].
    fn decide(&self, request: &RequestInfo) -> Result<Decision>;

    /// Whether rate limit headers should be attached to forwarded responses.
    fn should_set_rate_limit_headers(&self) -> bool {
        false
    }

    /// Whether the request passes the target filter.
    fn in_scope(&self, request: &RequestInfo) -> bool {
        self.base().filter.in_scope(request)
    }

    /// Produce the response for a request whose bucket is over quota.
    fn on_limit(&self, ctx: &LimitContext) -> Response<String> {
        self.base().on_limit.on_limit(ctx, self.name())
    }
}

/// Values every strategy is constructed with.
#[derive(Clone)]
pub struct StrategyBase {
    /// Requests allowed per window; negative disables limiting
    pub limit: i64,
    /// Window length, always non-zero
    pub window: Duration,
    pub filter: TargetFilter,
    on_limit: Arc<dyn LimitHandler>,
}

impl StrategyBase {
    /// Create base values with a permit-all target filter.
    pub fn new(limit: i64, window: Duration) -> Result<Self> {
        Self::with_filter(limit, window, &TargetFilterConfig::default())
    }

    /// Create base values with a target filter.
    pub fn with_filter(limit: i64, window: Duration, filter: &TargetFilterConfig) -> Result<Self> {
        if window.is_zero() {
            return Err(KeyclassError::Config(
                "window length must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            limit,
            window,
            filter: TargetFilter::new(filter),
            on_limit: Arc::new(TooManyRequests),
        })
    }

    /// Replace the handler invoked when a bucket is over quota.
    pub fn with_limit_handler(mut self, handler: Arc<dyn LimitHandler>) -> Self {
        self.on_limit = handler;
        self
    }

    /// A limited decision for `key` using the base limit.
    pub fn limited(&self, key: impl Into<String>) -> Decision {
        Decision::limited(key, self.limit, self.window)
    }
}

impl std::fmt::Debug for StrategyBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyBase")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_zero_window_rejected() {
        let err = StrategyBase::new(10, Duration::ZERO).unwrap_err();
        assert!(matches!(err, KeyclassError::Config(_)));
    }

    #[test]
    fn test_limited_uses_base_values() {
        let base = StrategyBase::new(7, Duration::from_secs(30)).unwrap();
        assert_eq!(
            base.limited("k"),
            Decision::Limited {
                key: "k".to_string(),
                limit: 7,
                window: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn test_custom_limit_handler() {
        let handler = |_ctx: &LimitContext, name: &str| {
            Response::builder()
                .status(StatusCode::SERVICE_UNAVAILABLE)
                .body(format!("blocked by {}", name))
                .unwrap_or_default()
        };
        let base = StrategyBase::new(1, Duration::from_secs(1))
            .unwrap()
            .with_limit_handler(Arc::new(handler));

        let ctx = LimitContext {
            key: "k".to_string(),
            limit: 1,
            count: 1,
            window: Duration::from_secs(1),
            reset_after: Duration::from_millis(500),
        };
        let response = base.on_limit.on_limit(&ctx, "test");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body(), "blocked by test");
    }
}
