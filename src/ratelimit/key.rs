//! Counter key formatting shared by the strategies.
//!
//! Keys are plain strings. Two distinct buckets must never format to the same
//! string, and one bucket must always format the same way, so every strategy
//! goes through these helpers instead of formatting request fields itself.

use std::fmt;
use std::str::FromStr;

use crate::error::KeyclassError;

use super::request::RequestInfo;

/// Identifier selecting the client address as key source.
pub const REMOTE_ADDR_KEY: &str = "remote_addr";
/// Identifier selecting the virtual host as key source.
pub const HOST_KEY: &str = "host";

/// Strip a `:port` suffix from a client address.
///
/// Splits on the first `:`; an address without one is returned whole.
pub fn strip_port(remote_addr: &str) -> &str {
    remote_addr
        .split_once(':')
        .map_or(remote_addr, |(addr, _)| addr)
}

/// Which request field prefixes a composite key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySource {
    /// Client address with the port stripped
    RemoteAddr,
    /// Virtual host as sent by the client
    #[default]
    Host,
}

impl KeySource {
    /// The request field this source selects.
    pub fn fill<'a>(&self, request: &'a RequestInfo) -> &'a str {
        match self {
            KeySource::RemoteAddr => strip_port(&request.remote_addr),
            KeySource::Host => &request.host,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::RemoteAddr => REMOTE_ADDR_KEY,
            KeySource::Host => HOST_KEY,
        }
    }
}

impl FromStr for KeySource {
    type Err = KeyclassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            REMOTE_ADDR_KEY => Ok(KeySource::RemoteAddr),
            HOST_KEY => Ok(KeySource::Host),
            other => Err(KeyclassError::Config(format!("invalid key: {}", other))),
        }
    }
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key for a path-pattern bucket: key source value followed by the pattern.
pub fn path_key(source: &str, pattern: &str) -> String {
    format!("{}{}", source, pattern)
}

/// Key for a query-parameter bucket: `host/name=value`.
pub fn query_key(host: &str, name: &str, value: &str) -> String {
    format!("{}/{}={}", host, name, value)
}
