use tracing::{debug, trace};

use crate::error::Result;
use crate::ratelimit::decision::Decision;
use crate::ratelimit::key::query_key;
use crate::ratelimit::request::RequestInfo;
use crate::ratelimit::strategy::{KeyStrategy, StrategyBase};

/// Limits requests carrying a query parameter with an exact value.
///
/// Parameters are tried in declaration order; the first `name=value` pair
/// present in the query string wins and is keyed per host.
#[derive(Debug, Clone)]
pub struct QueryParameterStrategy {
    base: StrategyBase,
    parameters: Vec<(String, String)>,
}

impl QueryParameterStrategy {
    pub fn new(parameters: Vec<(String, String)>, base: StrategyBase) -> Self {
        Self { base, parameters }
    }
}

impl KeyStrategy for QueryParameterStrategy {
    fn name(&self) -> &str {
        "query_parameter"
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
            .parameters
            .iter()
            .find(|(name, value)| request.query_param(name).is_some_and(|v| v == value.as_str()))
            .map_or(Decision::Unlimited, |(name, value)| {
                self.base.limited(query_key(&request.host, name, value))
            });
        trace!(strategy = self.name(), decision = %decision, "Classified request");
        Ok(decision)
    }
}
