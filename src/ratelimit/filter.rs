//! Target filtering: deciding whether a request is in scope for a strategy.
//!
//! Every strategy runs the same three gates before its own matching:
//! - extension allow-list (empty means allow all)
//! - method allow-list (empty means allow all)
//! - path ignore lists (prefix, suffix, contains); any hit excludes the request

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use super::request::RequestInfo;

/// How a path pattern is compared against a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Prefix,
    Suffix,
    Contains,
}

impl MatchKind {
    pub fn matches(&self, path: &str, pattern: &str) -> bool {
        match self {
            MatchKind::Prefix => path.starts_with(pattern),
            MatchKind::Suffix => path.ends_with(pattern),
            MatchKind::Contains => path.contains(pattern),
        }
    }
}

/// Three pattern lists evaluated in a fixed priority order.
///
/// Prefix patterns are tried first, then suffix, then contains. Within a list,
/// patterns are tried in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathPatterns {
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
    pub contains: Vec<String>,
}

impl PathPatterns {
    pub fn new(prefixes: Vec<String>, suffixes: Vec<String>, contains: Vec<String>) -> Self {
        Self {
            prefixes,
            suffixes,
            contains,
        }
    }

    /// All patterns in priority order, tagged with their match kind.
    pub fn iter(&self) -> impl Iterator<Item = (MatchKind, &str)> {
        tagged(MatchKind::Prefix, &self.prefixes)
            .chain(tagged(MatchKind::Suffix, &self.suffixes))
            .chain(tagged(MatchKind::Contains, &self.contains))
    }

    /// Patterns that match `path`, in priority order.
    pub fn matching<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.iter()
            .filter(move |(kind, pattern)| kind.matches(path, pattern))
            .map(|(_, pattern)| pattern)
    }

    /// Whether any pattern matches `path`.
    pub fn any_match(&self, path: &str) -> bool {
        self.matching(path).next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.suffixes.is_empty() && self.contains.is_empty()
    }
}

fn tagged(kind: MatchKind, list: &[String]) -> impl Iterator<Item = (MatchKind, &str)> {
    list.iter().map(move |p| (kind, p.as_str()))
}

/// Caller-supplied target filter options. All lists are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetFilterConfig {
    /// File extensions to limit, with or without the leading dot
    #[serde(default)]
    pub extensions: Vec<String>,
    /// HTTP methods to limit
    #[serde(default)]
    pub methods: Vec<String>,
    /// Paths containing any of these are never limited
    #[serde(default)]
    pub ignore_path_contains: Vec<String>,
    /// Paths starting with any of these are never limited
    #[serde(default)]
    pub ignore_path_prefixes: Vec<String>,
    /// Paths ending with any of these are never limited
    #[serde(default)]
    pub ignore_path_suffixes: Vec<String>,
}

/// The scope gate shared by all strategies. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct TargetFilter {
    extensions: HashSet<String>,
    methods: HashSet<String>,
    ignore: PathPatterns,
}

impl TargetFilter {
    /// Build a filter, normalizing extensions to lower case with a leading dot
    /// and methods to lower case. Empty extension entries are kept and never
    /// match, so a configured allow list always restricts.
    pub fn new(config: &TargetFilterConfig) -> Self {
        let extensions = config
            .extensions
            .iter()
            .map(|ext| {
                let ext = ext.to_lowercase();
                if ext.is_empty() || ext.starts_with('.') {
                    ext
                } else {
                    format!(".{}", ext)
                }
            })
            .collect();
        let methods = config.methods.iter().map(|m| m.to_lowercase()).collect();

        Self {
            extensions,
            methods,
            ignore: PathPatterns::new(
                config.ignore_path_prefixes.clone(),
                config.ignore_path_suffixes.clone(),
                config.ignore_path_contains.clone(),
            ),
        }
    }

    /// Whether the request is eligible for the owning strategy's quota logic.
    pub fn in_scope(&self, request: &RequestInfo) -> bool {
        if !self.extension_allowed(request) {
            debug!(path = %request.path, "Extension not targeted");
            return false;
        }
        if !self.method_allowed(request) {
            debug!(method = %request.method, "Method not targeted");
            return false;
        }
        if self.ignore.any_match(&request.path) {
            debug!(path = %request.path, "Path ignored");
            return false;
        }
        true
    }

    fn extension_allowed(&self, request: &RequestInfo) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let ext = request.extension();
        !ext.is_empty() && self.extensions.contains(&ext.to_lowercase())
    }

    fn method_allowed(&self, request: &RequestInfo) -> bool {
        self.methods.is_empty() || self.methods.contains(&request.method.to_lowercase())
    }
}
