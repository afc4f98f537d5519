//! Keyclass - request classification for gateway rate limiting
//!
//! This crate decides, for each inbound HTTP request, whether it is subject
//! to a quota, which bucket it belongs to, and which limit and window apply.
//! Six strategies (client address, virtual host, country, user agent, request
//! path, query parameter) share a common target filter and report a uniform
//! [`ratelimit::Decision`].

pub mod config;
pub mod error;
pub mod ratelimit;
