use tracing::{debug, trace};

use crate::error::Result;
use crate::ratelimit::decision::Decision;
use crate::ratelimit::filter::PathPatterns;
use crate::ratelimit::key::{path_key, KeySource};
use crate::ratelimit::request::RequestInfo;
use crate::ratelimit::strategy::{KeyStrategy, StrategyBase};

/// Limits requests whose path matches a trigger pattern.
///
/// Triggers are tried prefix first, then suffix, then contains, each list in
/// declaration order. Ignore patterns are checked per candidate: an ignored
/// candidate is skipped and evaluation moves on to the next trigger pattern.
/// The key is the key source value followed by the winning pattern.
#[derive(Debug, Clone)]
pub struct PathStrategy {
    base: StrategyBase,
    triggers: PathPatterns,
    ignores: PathPatterns,
    key_source: KeySource,
}

impl PathStrategy {
    pub fn new(triggers: PathPatterns, ignores: PathPatterns, base: StrategyBase) -> Self {
        Self {
            base,
            triggers,
            ignores,
            key_source: KeySource::default(),
        }
    }

    pub fn with_key_source(mut self, key_source: KeySource) -> Self {
        self.key_source = key_source;
        self
    }

    pub fn key_source(&self) -> KeySource {
        self.key_source
    }
}

impl KeyStrategy for PathStrategy {
    fn name(&self) -> &str {
        "request_path"
    }

    fn base(&self) -> &StrategyBase {
        &self.base
    }

    fn decide(&self, request: &RequestInfo) -> Result<Decision> {
        if !self.in_scope(request) {
            debug!(strategy = self.name(), "Request out of scope");
            return Ok(Decision::Unlimited);
        }

        let path = request.path.as_str();
        let matched = self.triggers.matching(path).find(|pattern| {
            let ignored = self.ignores.any_match(path);
            if ignored {
                trace!(pattern = %pattern, path = %path, "Trigger suppressed by ignore list");
            }
            !ignored
        });

        let decision = match matched {
            Some(pattern) => self
                .base
                .limited(path_key(self.key_source.fill(request), pattern)),
            None => Decision::Unlimited,
        };
        trace!(strategy = self.name(), decision = %decision, "Classified request");
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::strategies::test_support::{base, strings, LIMIT, WINDOW};

    struct Case {
        name: &'static str,
        contains: &'static [&'static str],
        prefixes: &'static [&'static str],
        suffixes: &'static [&'static str],
        ignore_contains: &'static [&'static str],
        ignore_prefixes: &'static [&'static str],
        ignore_suffixes: &'static [&'static str],
        path: &'static str,
        expected_key: Option<&'static str>,
    }

    fn strategy(case: &Case) -> PathStrategy {
        PathStrategy::new(
            PathPatterns::new(
                strings(case.prefixes),
                strings(case.suffixes),
                strings(case.contains),
            ),
            PathPatterns::new(
                strings(case.ignore_prefixes),
                strings(case.ignore_suffixes),
                strings(case.ignore_contains),
            ),
            base(),
        )
    }

    #[test]
    fn test_request_path_rules() {
        let cases = [
            Case {
                name: "Path contains limited segment",
                contains: &["/user"],
                prefixes: &["/api/"],
                suffixes: &["/details"],
                ignore_contains: &[],
                ignore_prefixes: &[],
                ignore_suffixes: &[],
                path: "/accounts/user/profile",
                expected_key: Some("example.com/user"),
            },
            Case {
                name: "Path starts with limited prefix",
                contains: &["user"],
                prefixes: &["/api/"],
                suffixes: &["/details"],
                ignore_contains: &[],
                ignore_prefixes: &[],
                ignore_suffixes: &[],
                path: "/api/users/1",
                expected_key: Some("example.com/api/"),
            },
            Case {
                name: "Path ends with limited suffix",
                contains: &["user"],
                prefixes: &["/api/"],
                suffixes: &["/details"],
                ignore_contains: &[],
                ignore_prefixes: &[],
                ignore_suffixes: &[],
                path: "/users/1/details",
                expected_key: Some("example.com/details"),
            },
            Case {
                name: "Path does not match any criteria",
                contains: &["user"],
                prefixes: &["/api/"],
                suffixes: &["/details"],
                ignore_contains: &[],
                ignore_prefixes: &[],
                ignore_suffixes: &[],
                path: "/about",
                expected_key: None,
            },
            Case {
                name: "Ignore path contains limited segment",
                contains: &["/abc"],
                prefixes: &["/abcd"],
                suffixes: &["/abcde"],
                ignore_contains: &["ab"],
                ignore_prefixes: &[],
                ignore_suffixes: &[],
                path: "/abcdefg",
                expected_key: None,
            },
            Case {
                name: "Ignore path starts with limited prefix",
                contains: &["/abc"],
                prefixes: &["/abcd"],
                suffixes: &["/abcde"],
                ignore_contains: &[],
                ignore_prefixes: &["/a"],
                ignore_suffixes: &[],
                path: "/abcdefg",
                expected_key: None,
            },
            Case {
                name: "Ignore path ends with limited suffix",
                contains: &["/abc"],
                prefixes: &["/abcd"],
                suffixes: &["/abcde"],
                ignore_contains: &[],
                ignore_prefixes: &[],
                ignore_suffixes: &["g"],
                path: "/abcdefg",
                expected_key: None,
            },
            Case {
                name: "Ignore list that does not match keeps trigger",
                contains: &["/abc"],
                prefixes: &[],
                suffixes: &[],
                ignore_contains: &["xyz"],
                ignore_prefixes: &[],
                ignore_suffixes: &[],
                path: "/abcdefg",
                expected_key: Some("example.com/abc"),
            },
            Case {
                name: "First declared prefix wins",
                contains: &[],
                prefixes: &["/api", "/api/v1"],
                suffixes: &[],
                ignore_contains: &[],
                ignore_prefixes: &[],
                ignore_suffixes: &[],
                path: "/api/v1/items",
                expected_key: Some("example.com/api"),
            },
        ];

        for case in &cases {
            let req = RequestInfo::new("GET", case.path).with_host("example.com");
            let decision = strategy(case).decide(&req).unwrap();
            assert_eq!(decision.key(), case.expected_key, "{}", case.name);
            if case.expected_key.is_some() {
                assert_eq!(decision.limit(), LIMIT, "{}", case.name);
                assert_eq!(decision.window(), Some(WINDOW), "{}", case.name);
            }
        }
    }

    #[test]
    fn test_remote_addr_key_source() {
        let strategy = PathStrategy::new(
            PathPatterns::new(strings(&["/login"]), vec![], vec![]),
            PathPatterns::default(),
            base(),
        )
        .with_key_source(KeySource::RemoteAddr);
        assert_eq!(strategy.key_source(), KeySource::RemoteAddr);

        let req = RequestInfo::new("POST", "/login")
            .with_host("example.com")
            .with_remote_addr("203.0.113.7:50000");
        let decision = strategy.decide(&req).unwrap();
        assert_eq!(decision.key(), Some("203.0.113.7/login"));
    }

    #[test]
    fn test_no_triggers_is_unlimited() {
        let strategy = PathStrategy::new(PathPatterns::default(), PathPatterns::default(), base());
        let req = RequestInfo::new("GET", "/anything").with_host("example.com");
        assert_eq!(strategy.decide(&req).unwrap(), Decision::Unlimited);
    }
}
