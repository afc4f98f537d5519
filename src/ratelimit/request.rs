//! The request view that strategies classify.

use std::borrow::Cow;
use std::sync::OnceLock;

use tracing::trace;

/// The parts of an inbound HTTP request that classification looks at.
///
/// A `RequestInfo` lives for one request's evaluation. The only state it
/// accumulates is the resolved client country, which is filled at most once
/// so that several country strategies evaluating the same request share a
/// single geolocation lookup.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// HTTP method as received (any case)
    pub method: String,
    /// URL path without the query string
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: Option<String>,
    /// Virtual host, including any port the client sent
    pub host: String,
    /// Client address, usually `ip:port`
    pub remote_addr: String,
    /// Value of the `User-Agent` header, empty when absent
    pub user_agent: String,
    country: OnceLock<String>,
}

impl RequestInfo {
    /// Create a request view for a method and path.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_remote_addr(mut self, remote_addr: impl Into<String>) -> Self {
        self.remote_addr = remote_addr.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Attach a country that was already resolved earlier in the gateway pass.
    pub fn with_country(self, country: impl Into<String>) -> Self {
        let _ = self.country.set(country.into());
        self
    }

    /// Build a request view from an `http` request and the peer address.
    ///
    /// The host comes from the `Host` header when present, otherwise from the
    /// URI authority.
    pub fn from_http<B>(request: &http::Request<B>, remote_addr: impl Into<String>) -> Self {
        let uri = request.uri();
        let host = request
            .headers()
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
            .unwrap_or_default();
        let user_agent = request
            .headers()
            .get(http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Self {
            method: request.method().as_str().to_string(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            host,
            remote_addr: remote_addr.into(),
            user_agent,
            country: OnceLock::new(),
        }
    }

    /// File extension of the last path segment, including the leading dot.
    ///
    /// Returns an empty string when the last segment has no dot.
    pub fn extension(&self) -> &str {
        let segment = self.path.rsplit('/').next().unwrap_or_default();
        match segment.rfind('.') {
            Some(idx) => &segment[idx..],
            None => "",
        }
    }

    /// First decoded value of a query parameter, if the parameter is present.
    pub fn query_param(&self, name: &str) -> Option<Cow<'_, str>> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// The country resolved for this request so far, if any.
    pub fn resolved_country(&self) -> Option<&str> {
        self.country.get().map(String::as_str)
    }

    /// Remember the resolved country for later strategies. First write wins.
    pub(crate) fn remember_country(&self, country: &str) {
        if self.country.set(country.to_string()).is_ok() {
            trace!(country = %country, "Cached resolved country for request");
        }
    }
}
