use tracing::{debug, trace};

use crate::error::Result;
use crate::ratelimit::decision::Decision;
use crate::ratelimit::request::RequestInfo;
use crate::ratelimit::strategy::{KeyStrategy, StrategyBase};

/// Limits requests whose user agent contains one of the configured substrings.
///
/// The first configured substring found in the header wins and becomes the key,
/// so all matching clients share one bucket per substring.
#[derive(Debug, Clone)]
pub struct UserAgentStrategy {
    base: StrategyBase,
    user_agents: Vec<String>,
}

impl UserAgentStrategy {
    pub fn new(user_agents: Vec<String>, base: StrategyBase) -> Self {
        Self { base, user_agents }
    }
}

impl KeyStrategy for UserAgentStrategy {
    fn name(&self) -> &str {
        "user_agent"
    }

    fn base(&self) -> &StrategyBase {
        &self.base
    }

    fn decide(&self, request: &RequestInfo) -> Result<Decision> {
        if !self.in_scope(request) {
            debug!(strategy = self.name(), "Request out of scope");
            return Ok(Decision::Unlimited);
        }

        let decision = self
            .user_agents
            .iter()
            .find(|ua| request.user_agent.contains(ua.as_str()))
            .map_or(Decision::Unlimited, |ua| self.base.limited(ua.as_str()));
        trace!(strategy = self.name(), decision = %decision, "Classified request");
        Ok(decision)
    }
}
