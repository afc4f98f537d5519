use tracing::{debug, trace};

use crate::error::Result;
use crate::ratelimit::decision::Decision;
use crate::ratelimit::key::strip_port;
use crate::ratelimit::request::RequestInfo;
use crate::ratelimit::strategy::{KeyStrategy, StrategyBase};

/// Limits requests per client address. Every in-scope request is limited.
#[derive(Debug, Clone)]
pub struct AddressStrategy {
    base: StrategyBase,
}

impl AddressStrategy {
    pub fn new(base: StrategyBase) -> Self {
        Self { base }
    }
}

impl KeyStrategy for AddressStrategy {
    fn name(&self) -> &str {
        "address"
    }

    fn base(&self) -> &StrategyBase {
        &self.base
    }

    fn decide(&self, request: &RequestInfo) -> Result<Decision> {
        if !self.in_scope(request) {
            debug!(strategy = self.name(), "Request out of scope");
            return Ok(Decision::Unlimited);
        }
        let decision = self.base.limited(strip_port(&request.remote_addr));
        trace!(strategy = self.name(), decision = %decision, "Classified request");
        Ok(decision)
    }
}
