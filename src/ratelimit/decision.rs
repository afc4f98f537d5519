//! The per-request output of a strategy.

use std::fmt;
use std::time::Duration;

/// Limit value reported for requests that are not subject to any quota.
pub const UNLIMITED: i64 = -1;

/// What a strategy decided for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request counts against `key`, which allows `limit` requests per `window`.
    Limited {
        key: String,
        limit: u64,
        window: Duration,
    },
    /// The request is not subject to this strategy's quota.
    Unlimited,
}

impl Decision {
    /// Build a limited decision.
    ///
    /// A negative limit disables limiting and yields [`Decision::Unlimited`].
    pub fn limited(key: impl Into<String>, limit: i64, window: Duration) -> Self {
        match u64::try_from(limit) {
            Ok(limit) => Decision::Limited {
                key: key.into(),
                limit,
                window,
            },
            Err(_) => Decision::Unlimited,
        }
    }

    pub fn is_limited(&self) -> bool {
        matches!(self, Decision::Limited { .. })
    }

    /// The bucket key, if the request is limited.
    pub fn key(&self) -> Option<&str> {
        match self {
            Decision::Limited { key, .. } => Some(key),
            Decision::Unlimited => None,
        }
    }

    /// The request limit, or [`UNLIMITED`].
    pub fn limit(&self) -> i64 {
        match self {
            Decision::Limited { limit, .. } => i64::try_from(*limit).unwrap_or(i64::MAX),
            Decision::Unlimited => UNLIMITED,
        }
    }

    pub fn window(&self) -> Option<Duration> {
        match self {
            Decision::Limited { window, .. } => Some(*window),
            Decision::Unlimited => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Limited { key, limit, window } => {
                write!(f, "limited key={} limit={} window={:?}", key, limit, window)
            }
            Decision::Unlimited => write!(f, "unlimited"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limited_decision() {
        let decision = Decision::limited("10.0.0.1", 5, Duration::from_secs(60));
        assert!(decision.is_limited());
        assert_eq!(decision.key(), Some("10.0.0.1"));
        assert_eq!(decision.limit(), 5);
        assert_eq!(decision.window(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_negative_limit_is_unlimited() {
        let decision = Decision::limited("10.0.0.1", -1, Duration::from_secs(60));
        assert_eq!(decision, Decision::Unlimited);
        assert_eq!(decision.limit(), UNLIMITED);
        assert_eq!(decision.key(), None);
        assert_eq!(decision.window(), None);
    }

    #[test]
    fn test_zero_limit_is_still_limited() {
        let decision = Decision::limited("host", 0, Duration::from_secs(1));
        assert!(decision.is_limited());
        assert_eq!(decision.limit(), 0);
    }

    #[test]
    fn test_display() {
        let decision = Decision::limited("example.com/api/", 10, Duration::from_secs(1));
        assert_eq!(decision.to_string(), "limited key=example.com/api/ limit=10 window=1s");
        assert_eq!(Decision::Unlimited.to_string(), "unlimited");
    }
}
