use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{KeyclassError, Result};
use crate::ratelimit::decision::Decision;
use crate::ratelimit::geo::{CountryLookup, WILDCARD_COUNTRY};
use crate::ratelimit::key::strip_port;
use crate::ratelimit::request::RequestInfo;
use crate::ratelimit::strategy::{KeyStrategy, StrategyBase};

/// Limits requests per client address for clients in selected countries.
///
/// Resolution order for an in-scope request:
/// 1. no country resolved: unlimited
/// 2. country in the skip set: unlimited
/// 3. include set holds the wildcard, or holds the country: limited by address
/// 4. otherwise unlimited
pub struct CountryStrategy {
    base: StrategyBase,
    lookup: Arc<dyn CountryLookup>,
    countries: HashSet<String>,
    skip_countries: HashSet<String>,
}

impl CountryStrategy {
    /// Create a country strategy.
    ///
    /// Fails with a configuration error if the skip set holds the wildcard.
    pub fn new<I, S, J, T>(
        lookup: Arc<dyn CountryLookup>,
        countries: I,
        skip_countries: J,
        base: StrategyBase,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        J: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let countries = countries.into_iter().map(|c| normalize(c.as_ref())).collect();
        let skip_countries = skip_countries
            .into_iter()
            .map(|c| normalize(c.as_ref()))
            .collect::<HashSet<_>>();

        if skip_countries.contains(WILDCARD_COUNTRY) {
            return Err(KeyclassError::Config(format!(
                "invalid skip country: {}",
                WILDCARD_COUNTRY
            )));
        }

        Ok(Self {
            base,
            lookup,
            countries,
            skip_countries,
        })
    }

    /// Country for this request, from the request cache or the lookup.
    fn resolve(&self, request: &RequestInfo, addr: &str) -> Result<String> {
        if let Some(country) = request.resolved_country() {
            return Ok(normalize(country));
        }

        let ip: IpAddr = addr.parse().map_err(|_| {
            KeyclassError::Classification(format!("invalid client address: {}", addr))
        })?;
        let country = self.lookup.country(ip)?.map(|c| normalize(&c)).unwrap_or_default();
        request.remember_country(&country);
        Ok(country)
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

impl KeyStrategy for CountryStrategy {
    fn name(&self) -> &str {
        "country"
    }

    fn base(&self) -> &StrategyBase {
        &self.base
    }

    fn decide(&self, request: &RequestInfo) -> Result<Decision> {
        if !self.in_scope(request) {
            debug!(strategy = self.name(), "Request out of scope");
            return Ok(Decision::Unlimited);
        }

        let addr = strip_port(&request.remote_addr);
        let country = self.resolve(request, addr)?;

        let decision = if country.is_empty() || self.skip_countries.contains(&country) {
            Decision::Unlimited
        } else if self.countries.contains(WILDCARD_COUNTRY) || self.countries.contains(&country) {
            self.base.limited(addr)
        } else {
            Decision::Unlimited
        };

        trace!(
            strategy = self.name(),
            country = %country,
            decision = %decision,
            "Classified request"
        );
        Ok(decision)
    }
}

impl std::fmt::Debug for CountryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountryStrategy")
            .field("base", &self.base)
            .field("countries", &self.countries)
            .field("skip_countries", &self.skip_countries)
            .finish_non_exhaustive()
    }
}
