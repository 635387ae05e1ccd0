// Copyright 2015-2021 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Configuration module for the server binary, `butternut-dns`.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use butternut_proto::rr::Name;

use crate::error::{Error, Result};

/// A configured upstream nameserver and the zones it answers for.
///
/// An entry with no zones is a *default* server: it is only consulted when no
/// zoned server matches a query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NameServerConfig {
    zones: Vec<Name>,
    addr: SocketAddr,
}

impl NameServerConfig {
    /// A default server, forwarded to when no zone matches
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            zones: Vec::new(),
            addr,
        }
    }

    /// A server answering only for the given zones
    pub fn with_zones(addr: SocketAddr, zones: Vec<Name>) -> Self {
        Self { zones, addr }
    }

    /// The address queries to this server are sent to
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The zones this server answers for; empty for a default server
    pub fn zones(&self) -> &[Name] {
        &self.zones
    }

    /// True when this server carries no zones and acts as a fallback
    pub fn is_default(&self) -> bool {
        self.zones.is_empty()
    }
}

/// The immutable runtime configuration of a forwarder.
#[derive(Clone, Debug, Default)]
pub struct ForwardConfig {
    name_servers: Vec<NameServerConfig>,
    search: Vec<Name>,
}

impl ForwardConfig {
    /// Validates and installs a server list.
    ///
    /// Within one configuration every server address must be unique.
    pub fn new(name_servers: Vec<NameServerConfig>, search: Vec<Name>) -> Result<Self> {
        let mut seen = HashSet::new();
        for server in &name_servers {
            if !seen.insert(server.addr()) {
                return Err(Error::DuplicateNameServer(server.addr()));
            }
        }

        Ok(Self {
            name_servers,
            search,
        })
    }

    /// All configured servers, zoned and default
    pub fn name_servers(&self) -> &[NameServerConfig] {
        &self.name_servers
    }

    /// The search domains carried alongside the server list.
    ///
    /// Search expansion happens in the downstream resolver; the forwarder
    /// only transports the list.
    pub fn search(&self) -> &[Name] {
        &self.search
    }
}

/// The TOML file format consumed by the binary.
///
/// ```toml
/// listen = "127.0.0.1:5300"
/// search = ["example.com"]
///
/// [[name_server]]
/// address = "10.0.0.53:53"
/// zones = ["example.com", "example.org"]
///
/// [[name_server]]
/// address = "8.8.8.8:53"
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    listen: Option<SocketAddr>,
    #[serde(default)]
    search: Vec<String>,
    #[serde(default, rename = "name_server")]
    name_servers: Vec<NameServerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NameServerEntry {
    address: SocketAddr,
    #[serde(default)]
    zones: Vec<String>,
}

impl Config {
    /// Read a Config from the file at `path`
    pub fn read_config(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)?;
        Self::from_toml(&toml)
    }

    /// Load the Config from a TOML string
    pub fn from_toml(toml: &str) -> Result<Self> {
        Ok(toml::from_str(toml)?)
    }

    /// The listen address named in the file, if any
    pub fn listen(&self) -> Option<SocketAddr> {
        self.listen
    }

    /// Compile the file into the runtime configuration
    pub fn forward_config(&self) -> Result<Arc<ForwardConfig>> {
        let mut name_servers = Vec::with_capacity(self.name_servers.len());
        for entry in &self.name_servers {
            let zones = entry
                .zones
                .iter()
                .map(Name::from_ascii)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            name_servers.push(NameServerConfig::with_zones(entry.address, zones));
        }

        let search = self
            .search
            .iter()
            .map(Name::from_ascii)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Arc::new(ForwardConfig::new(name_servers, search)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml() {
        let config = Config::from_toml(
            r#"
            listen = "127.0.0.1:5300"
            search = ["example.com"]

            [[name_server]]
            address = "10.0.0.53:53"
            zones = ["example.com", "example.org"]

            [[name_server]]
            address = "8.8.8.8:53"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen(), Some("127.0.0.1:5300".parse().unwrap()));

        let forward = config.forward_config().unwrap();
        assert_eq!(forward.name_servers().len(), 2);
        assert_eq!(forward.search().len(), 1);

        let zoned = &forward.name_servers()[0];
        assert!(!zoned.is_default());
        assert_eq!(zoned.zones().len(), 2);
        assert_eq!(zoned.addr(), "10.0.0.53:53".parse().unwrap());

        assert!(forward.name_servers()[1].is_default());
    }

    #[test]
    fn test_empty_file() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.listen(), None);
        assert!(config.forward_config().unwrap().name_servers().is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Config::from_toml("nameserver = []").is_err());
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let err = Config::from_toml(
            r#"
            [[name_server]]
            address = "8.8.8.8:53"

            [[name_server]]
            address = "8.8.8.8:53"
            zones = ["example.com"]
            "#,
        )
        .unwrap()
        .forward_config()
        .unwrap_err();

        assert!(matches!(err, Error::DuplicateNameServer(_)));
    }
}
