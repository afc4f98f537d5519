//! Request classification for rate limiting.
//!
//! A [`KeyStrategy`] answers, for one request, whether it is subject to a
//! quota, which bucket it counts against, and what limit and window apply.
//! [`RateLimiter`] pairs a strategy with a [`Counter`] and a limit handler.

mod counter;
mod decision;
mod filter;
mod geo;
mod key;
mod limiter;
mod request;
mod rules;
mod strategy;
pub mod strategies;

pub use counter::{window_start, Counter, InMemoryCounter};
pub use decision::{Decision, UNLIMITED};
pub use filter::{MatchKind, PathPatterns, TargetFilter, TargetFilterConfig};
#[cfg(feature = "maxmind")]
pub use geo::MaxMindLookup;
pub use geo::{CountryLookup, StaticCountryLookup, WILDCARD_COUNTRY};
pub use key::{strip_port, KeySource, HOST_KEY, REMOTE_ADDR_KEY};
pub use limiter::{LimitContext, LimitHandler, Outcome, RateLimiter, TooManyRequests};
pub use request::RequestInfo;
pub use rules::{QueryParameter, RateLimitRule, RuleConfig, RuleSet, StrategyConfig, TimeUnit};
pub use strategies::{
    AddressStrategy, CountryStrategy, HostStrategy, PathStrategy, QueryParameterStrategy,
    UserAgentStrategy,
};
pub use strategy::{KeyStrategy, StrategyBase};
