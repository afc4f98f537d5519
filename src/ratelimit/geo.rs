//! Geolocation: resolving client addresses to ISO country codes.

use ipnet::IpNet;
use std::collections::HashMap;
use std::net::IpAddr;

use crate::error::{KeyclassError, Result};

/// Country code that matches every country in an include set.
pub const WILDCARD_COUNTRY: &str = "*";

/// Resolves an address to an ISO 3166-1 alpha-2 country code.
///
/// `Ok(None)` means the lookup worked but the address has no country (for
/// instance a private range). Errors are lookup failures.
pub trait CountryLookup: Send + Sync {
    fn country(&self, addr: IpAddr) -> Result<Option<String>>;
}

/// Lookup table of networks, resolved by longest prefix match.
#[derive(Debug, Clone, Default)]
pub struct StaticCountryLookup {
    networks: Vec<(IpNet, String)>,
}

impl StaticCountryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(mut self, network: IpNet, country: impl Into<String>) -> Self {
        self.networks.push((network, country.into()));
        self
    }

    /// Build a table from CIDR strings. A bare address is taken as a host route.
    pub fn from_map(entries: &HashMap<String, String>) -> Result<Self> {
        let mut lookup = Self::new();
        for (cidr, country) in entries {
            let network = parse_network(cidr)?;
            lookup.networks.push((network, country.clone()));
        }
        Ok(lookup)
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

fn parse_network(cidr: &str) -> Result<IpNet> {
    cidr.parse::<IpNet>()
        .or_else(|_| cidr.parse::<IpAddr>().map(IpNet::from))
        .map_err(|e| KeyclassError::Config(format!("invalid network '{}': {}", cidr, e)))
}

impl CountryLookup for StaticCountryLookup {
    fn country(&self, addr: IpAddr) -> Result<Option<String>> {
        Ok(self
            .networks
            .iter()
            .filter(|(net, _)| net.contains(&addr))
            .max_by_key(|(net, _)| net.prefix_len())
            .map(|(_, country)| country.clone()))
    }
}

#[cfg(feature = "maxmind")]
pub use self::maxmind::MaxMindLookup;

#[cfg(feature = "maxmind")]
mod maxmind {
    use maxminddb::{geoip2, MaxMindDBError, Reader};
    use std::net::IpAddr;
    use std::path::Path;
    use tracing::info;

    use super::CountryLookup;
    use crate::error::{KeyclassError, Result};

    /// Country lookup backed by a GeoIP2/GeoLite2 country database.
    pub struct MaxMindLookup {
        reader: Reader<Vec<u8>>,
    }

    impl MaxMindLookup {
        /// Open a database file. Failure is a configuration error.
        pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref();
            let reader = Reader::open_readfile(path).map_err(|e| {
                KeyclassError::Config(format!(
                    "failed to open geolocation database {}: {}",
                    path.display(),
                    e
                ))
            })?;
            info!(path = %path.display(), "Opened geolocation database");
            Ok(Self { reader })
        }
    }

    impl CountryLookup for MaxMindLookup {
        fn country(&self, addr: IpAddr) -> Result<Option<String>> {
            match self.reader.lookup::<geoip2::Country>(addr) {
                Ok(record) => Ok(record
                    .country
                    .and_then(|c| c.iso_code)
                    .map(str::to_string)),
                Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(None),
                Err(e) => Err(KeyclassError::Classification(format!(
                    "geolocation lookup failed for {}: {}",
                    addr, e
                ))),
            }
        }
    }
}
