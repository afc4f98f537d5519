use std::collections::HashMap;
use tracing::{debug, trace};

use crate::error::Result;
use crate::ratelimit::decision::Decision;
use crate::ratelimit::request::RequestInfo;
use crate::ratelimit::strategy::{KeyStrategy, StrategyBase};

/// Limits requests per virtual host, with optional per-host limits.
///
/// Per-host limits can be changed after construction through `&mut self`;
/// a caller that reconfigures while serving traffic wraps the strategy in its
/// own lock.
#[derive(Debug, Clone)]
pub struct HostStrategy {
    base: StrategyBase,
    host_limits: HashMap<String, i64>,
}

impl HostStrategy {
    pub fn new(base: StrategyBase) -> Self {
        Self {
            base,
            host_limits: HashMap::new(),
        }
    }

    pub fn with_host_limits(mut self, host_limits: HashMap<String, i64>) -> Self {
        self.host_limits = host_limits;
        self
    }

    /// Override the limit for one host. Returns the previous override.
    pub fn set_host_limit(&mut self, host: impl Into<String>, limit: i64) -> Option<i64> {
        self.host_limits.insert(host.into(), limit)
    }

    pub fn remove_host_limit(&mut self, host: &str) -> Option<i64> {
        self.host_limits.remove(host)
    }

    pub fn host_limits(&self) -> &HashMap<String, i64> {
        &self.host_limits
    }
}

impl KeyStrategy for HostStrategy {
    fn name(&self) -> &str {
        "host"
    }

    fn base(&self) -> &StrategyBase {
        &self.base
    }

    fn decide(&self, request: &RequestInfo) -> Result<Decision> {
        if !self.in_scope(request) {
            debug!(strategy = self.name(), "Request out of scope");
            return Ok(Decision::Unlimited);
        }

        let limit = self
            .host_limits
            .get(&request.host)
            .copied()
            .unwrap_or(self.base.limit);
        let decision = Decision::limited(request.host.as_str(), limit, self.base.window);
        trace!(strategy = self.name(), decision = %decision, "Classified request");
        Ok(decision)
    }
}
