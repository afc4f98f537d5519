//! Rule file loading and strategy construction.
//!
//! A rule file lists strategy definitions; each is tagged by `kind` and
//! carries a rate limit, an optional target filter, and the parameters of
//! that kind. Country rules resolve through the file's `geo` table unless they
//! name a database of their own.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::filter::{PathPatterns, TargetFilterConfig};
use super::geo::{CountryLookup, StaticCountryLookup};
use super::key::KeySource;
use super::strategies::{
    AddressStrategy, CountryStrategy, HostStrategy, PathStrategy, QueryParameterStrategy,
    UserAgentStrategy,
};
use super::strategy::{KeyStrategy, StrategyBase};
use crate::error::{KeyclassError, Result};

/// A complete rule file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    /// Static geolocation table: CIDR or address to ISO country code
    #[serde(default)]
    pub geo: HashMap<String, String>,
    /// Strategy definitions, evaluated in order by callers
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// One strategy definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub rate_limit: RateLimitRule,
    #[serde(default)]
    pub target: TargetFilterConfig,
    #[serde(flatten)]
    pub strategy: StrategyConfig,
}

/// Strategy-specific parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    Address,
    Host {
        #[serde(default)]
        host_limits: HashMap<String, i64>,
    },
    Country {
        #[serde(default)]
        countries: Vec<String>,
        #[serde(default)]
        skip_countries: Vec<String>,
        /// GeoIP2 country database (requires the `maxmind` feature)
        #[serde(default)]
        database: Option<PathBuf>,
    },
    UserAgent {
        user_agents: Vec<String>,
    },
    Path {
        #[serde(default)]
        prefixes: Vec<String>,
        #[serde(default)]
        suffixes: Vec<String>,
        #[serde(default)]
        contains: Vec<String>,
        #[serde(default)]
        ignore_prefixes: Vec<String>,
        #[serde(default)]
        ignore_suffixes: Vec<String>,
        #[serde(default)]
        ignore_contains: Vec<String>,
        /// `host` (default) or `remote_addr`
        #[serde(default)]
        key_source: Option<String>,
    },
    QueryParameter {
        parameters: Vec<QueryParameter>,
    },
}

/// A required `name=value` query pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: String,
}

/// Requests allowed per window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Requests allowed per window; negative disables limiting
    pub requests_per_unit: i64,
    /// The time unit
    pub unit: TimeUnit,
    /// Window length in units
    #[serde(default = "default_units")]
    pub units: u32,
}

fn default_units() -> u32 {
    1
}

impl RateLimitRule {
    pub fn window(&self) -> Duration {
        self.unit.duration().saturating_mul(self.units)
    }
}

/// Time unit for rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    pub fn duration(&self) -> Duration {
        match self {
            TimeUnit::Second => Duration::from_secs(1),
            TimeUnit::Minute => Duration::from_secs(60),
            TimeUnit::Hour => Duration::from_secs(3600),
            TimeUnit::Day => Duration::from_secs(86400),
        }
    }
}

impl RuleSet {
    /// Load a rule file from YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rule file");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| KeyclassError::Config(format!("Failed to parse rule file: {}", e)))
    }

    /// Build every strategy, resolving country rules through the `geo` table.
    pub fn build(&self) -> Result<Vec<Arc<dyn KeyStrategy>>> {
        let lookup: Arc<dyn CountryLookup> = Arc::new(StaticCountryLookup::from_map(&self.geo)?);
        self.build_with_lookup(lookup)
    }

    /// Build every strategy with a caller-supplied country lookup.
    ///
    /// Country rules naming their own database still open it.
    pub fn build_with_lookup(
        &self,
        lookup: Arc<dyn CountryLookup>,
    ) -> Result<Vec<Arc<dyn KeyStrategy>>> {
        let strategies = self
            .rules
            .iter()
            .map(|rule| rule.build(&lookup))
            .collect::<Result<Vec<_>>>()?;
        info!(count = strategies.len(), "Built classification strategies");
        Ok(strategies)
    }
}

impl RuleConfig {
    /// Construct the strategy this definition describes.
    pub fn build(&self, lookup: &Arc<dyn CountryLookup>) -> Result<Arc<dyn KeyStrategy>> {
        let base = StrategyBase::with_filter(
            self.rate_limit.requests_per_unit,
            self.rate_limit.window(),
            &self.target,
        )?;

        let strategy: Arc<dyn KeyStrategy> = match &self.strategy {
            StrategyConfig::Address => Arc::new(AddressStrategy::new(base)),
            StrategyConfig::Host { host_limits } => {
                Arc::new(HostStrategy::new(base).with_host_limits(host_limits.clone()))
            }
            StrategyConfig::Country {
                countries,
                skip_countries,
                database,
            } => {
                if countries.is_empty() {
                    warn!("Country rule has no countries and will never limit");
                }
                let lookup = match database {
                    Some(path) => open_database(path)?,
                    None => lookup.clone(),
                };
                Arc::new(CountryStrategy::new(lookup, countries, skip_countries, base)?)
            }
            StrategyConfig::UserAgent { user_agents } => {
                Arc::new(UserAgentStrategy::new(user_agents.clone(), base))
            }
            StrategyConfig::Path {
                prefixes,
                suffixes,
                contains,
                ignore_prefixes,
                ignore_suffixes,
                ignore_contains,
                key_source,
            } => {
                let key_source = match key_source {
                    Some(source) => source.parse::<KeySource>()?,
                    None => KeySource::default(),
                };
                let triggers =
                    PathPatterns::new(prefixes.clone(), suffixes.clone(), contains.clone());
                let ignores = PathPatterns::new(
                    ignore_prefixes.clone(),
                    ignore_suffixes.clone(),
                    ignore_contains.clone(),
                );
                Arc::new(PathStrategy::new(triggers, ignores, base).with_key_source(key_source))
            }
            StrategyConfig::QueryParameter { parameters } => {
                let parameters = parameters
                    .iter()
                    .map(|p| (p.name.clone(), p.value.clone()))
                    .collect();
                Arc::new(QueryParameterStrategy::new(parameters, base))
            }
        };
        Ok(strategy)
    }
}

#[cfg(feature = "maxmind")]
fn open_database(path: &Path) -> Result<Arc<dyn CountryLookup>> {
    Ok(Arc::new(super::geo::MaxMindLookup::open(path)?))
}

#[cfg(not(feature = "maxmind"))]
fn open_database(path: &Path) -> Result<Arc<dyn CountryLookup>> {
    Err(KeyclassError::Config(format!(
        "cannot open geolocation database {}: built without the `maxmind` feature",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::decision::Decision;
    use crate::ratelimit::request::RequestInfo;

    const RULES: &str = r#"
geo:
  "50.114.0.0/16": US
  "2.0.0.0/8": FR
rules:
  - kind: address
    rate_limit:
      requests_per_unit: 100
      unit: minute
  - kind: host
    rate_limit:
      requests_per_unit: 5
      unit: second
    host_limits:
      api.x.com: 1
  - kind: country
    rate_limit:
      requests_per_unit: 10
      unit: hour
    countries: ["US"]
  - kind: user_agent
    rate_limit:
      requests_per_unit: 3
      unit: minute
    user_agents: ["Googlebot", "bingbot"]
  - kind: path
    rate_limit:
      requests_per_unit: 20
      unit: second
      units: 10
    target:
      methods: ["GET"]
    prefixes: ["/api/"]
    suffixes: ["/details"]
    contains: ["/user"]
  - kind: query_parameter
    rate_limit:
      requests_per_unit: 2
      unit: day
    parameters:
      - name: token
        value: "123456"
      - name: sessionId
        value: ABCDEF
"#;

    fn names(strategies: &[Arc<dyn KeyStrategy>]) -> Vec<&str> {
        strategies.iter().map(|s| s.name()).collect()
    }

    #[test]
    fn test_parse_and_build_all_kinds() {
        let rules = RuleSet::from_yaml(RULES).unwrap();
        assert_eq!(rules.rules.len(), 6);

        let strategies = rules.build().unwrap();
        assert_eq!(
            names(&strategies),
            vec!["address", "host", "country", "user_agent", "request_path", "query_parameter"]
        );

        let req = RequestInfo::new("GET", "/api/users/1")
            .with_host("api.x.com")
            .with_remote_addr("50.114.0.1:1234")
            .with_user_agent("Mozilla/5.0 (compatible; Googlebot/2.1)")
            .with_query("token=123456&sessionId=XYZ");

        let decisions: Vec<Decision> = strategies.iter().map(|s| s.decide(&req).unwrap()).collect();
        assert_eq!(decisions[0].key(), Some("50.114.0.1"));
        assert_eq!(decisions[0].window(), Some(Duration::from_secs(60)));
        assert_eq!(decisions[1].key(), Some("api.x.com"));
        assert_eq!(decisions[1].limit(), 1);
        assert_eq!(decisions[2].key(), Some("50.114.0.1"));
        assert_eq!(decisions[2].window(), Some(Duration::from_secs(3600)));
        assert_eq!(decisions[3].key(), Some("Googlebot"));
        assert_eq!(decisions[4].key(), Some("api.x.com/api/"));
        assert_eq!(decisions[4].window(), Some(Duration::from_secs(10)));
        assert_eq!(decisions[5].key(), Some("api.x.com/token=123456"));
        assert!(format!("{:?}", strategies[0]).starts_with("AddressStrategy"));
    }

    #[test]
    fn test_target_filter_applies() {
        let strategies = RuleSet::from_yaml(RULES).unwrap().build().unwrap();
        let req = RequestInfo::new("POST", "/api/users/1").with_host("example.com");
        assert_eq!(strategies[4].decide(&req).unwrap(), Decision::Unlimited);
    }

    #[test]
    fn test_wildcard_skip_country_rejected() {
        let yaml = r#"
rules:
  - kind: country
    rate_limit:
      requests_per_unit: 10
      unit: hour
    countries: ["*"]
    skip_countries: ["*"]
"#;
        let err = RuleSet::from_yaml(yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, KeyclassError::Config(_)));
    }

    #[test]
    fn test_invalid_key_source_rejected() {
        let yaml = r#"
rules:
  - kind: path
    rate_limit:
      requests_per_unit: 10
      unit: second
    prefixes: ["/"]
    key_source: cookie
"#;
        let err = RuleSet::from_yaml(yaml).unwrap().build().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: invalid key: cookie");
    }

    #[test]
    fn test_remote_addr_key_source() {
        let yaml = r#"
rules:
  - kind: path
    rate_limit:
      requests_per_unit: 10
      unit: second
    prefixes: ["/login"]
    key_source: remote_addr
"#;
        let strategies = RuleSet::from_yaml(yaml).unwrap().build().unwrap();
        let req = RequestInfo::new("POST", "/login").with_remote_addr("192.0.2.1:443");
        assert_eq!(strategies[0].decide(&req).unwrap().key(), Some("192.0.2.1/login"));
    }

    #[test]
    fn test_zero_window_rejected() {
        let yaml = r#"
rules:
  - kind: address
    rate_limit:
      requests_per_unit: 10
      unit: second
      units: 0
"#;
        let err = RuleSet::from_yaml(yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, KeyclassError::Config(_)));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let yaml = r#"
rules:
  - kind: cookie
    rate_limit:
      requests_per_unit: 10
      unit: second
"#;
        let err = RuleSet::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, KeyclassError::Config(_)));
    }

    #[test]
    fn test_invalid_geo_table_rejected() {
        let yaml = r#"
geo:
  "not-a-network": US
"#;
        let err = RuleSet::from_yaml(yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, KeyclassError::Config(_)));
    }

    #[cfg(not(feature = "maxmind"))]
    #[test]
    fn test_database_requires_feature() {
        let yaml = r#"
rules:
  - kind: country
    rate_limit:
      requests_per_unit: 10
      unit: hour
    countries: ["US"]
    database: /var/lib/GeoIP/GeoLite2-Country.mmdb
"#;
        let err = RuleSet::from_yaml(yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, KeyclassError::Config(_)));
    }

    #[test]
    fn test_time_unit_durations() {
        assert_eq!(TimeUnit::Second.duration(), Duration::from_secs(1));
        assert_eq!(TimeUnit::Minute.duration(), Duration::from_secs(60));
        assert_eq!(TimeUnit::Hour.duration(), Duration::from_secs(3600));
        assert_eq!(TimeUnit::Day.duration(), Duration::from_secs(86400));
    }

    #[test]
    fn test_example_rule_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/rules.yaml");
        let strategies = RuleSet::from_file(path).unwrap().build().unwrap();
        assert_eq!(strategies.len(), 6);

        // Skipped country, so the country rule does not limit.
        let req = RequestInfo::new("GET", "/").with_remote_addr("50.114.0.1:4512");
        assert_eq!(strategies[2].decide(&req).unwrap(), Decision::Unlimited);

        let req = RequestInfo::new("GET", "/").with_remote_addr("2.3.4.5:4512");
        assert_eq!(strategies[2].decide(&req).unwrap().key(), Some("2.3.4.5"));
    }

    #[test]
    fn test_missing_rule_file_is_io_error() {
        let err = RuleSet::from_file("/nonexistent/rules.yaml").unwrap_err();
        assert!(matches!(err, KeyclassError::Io(_)));
    }

    #[test]
    fn test_empty_rule_file() {
        let rules = RuleSet::from_yaml("{}").unwrap();
        assert!(rules.build().unwrap().is_empty());
    }
}
