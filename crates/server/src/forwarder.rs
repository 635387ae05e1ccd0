// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The forwarding engine: picks upstreams for a query and races them.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::debug;

use butternut_proto::op::message;
use butternut_proto::rr::Name;
use butternut_proto::runtime::{RuntimeProvider, Time};
use butternut_proto::xfer::{Protocol, Upstream};

use crate::config::{ForwardConfig, NameServerConfig};

/// The whole race for one downstream query must resolve within this deadline
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Selects the nameservers responsible for `name`.
///
/// A server matches when any of its zones is a label-suffix of the query
/// name; every match is returned and the engine races them. When nothing
/// matches, the zoneless default servers are the answer — possibly none.
pub fn choose<'a>(
    name_servers: &'a [NameServerConfig],
    name: &Name,
) -> Vec<&'a NameServerConfig> {
    let matched: Vec<&NameServerConfig> = name_servers
        .iter()
        .filter(|server| server.zones().iter().any(|zone| zone.zone_of(name)))
        .collect();

    if !matched.is_empty() {
        return matched;
    }

    name_servers
        .iter()
        .filter(|server| server.is_default())
        .collect()
}

/// The per-transport forwarding engine.
///
/// One instance forwards over one protocol: the UDP listener feeds a UDP
/// engine, the TCP listener a TCP engine. Upstream clients are created on
/// first use and live for the life of the engine.
pub struct Forwarder<P: RuntimeProvider> {
    config: Arc<ForwardConfig>,
    protocol: Protocol,
    provider: P,
    clients: Mutex<HashMap<SocketAddr, Upstream<P>>>,
}

impl<P: RuntimeProvider> Forwarder<P> {
    /// Construct an engine over `config`, forwarding via `protocol`
    pub fn new(config: Arc<ForwardConfig>, protocol: Protocol, provider: P) -> Self {
        Self {
            config,
            protocol,
            provider,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The configuration this engine routes with
    pub fn config(&self) -> &Arc<ForwardConfig> {
        &self.config
    }

    /// Resolve one downstream query to the first upstream answer.
    ///
    /// `None` means the listener has nothing to send back: the query was
    /// unparseable, no server was responsible, every candidate failed, or
    /// the deadline passed. The downstream resolver retries on its own
    /// schedule.
    pub async fn answer(&self, query: &[u8]) -> Option<Vec<u8>> {
        let question = match message::single_query(query) {
            Ok(question) => question,
            Err(error) => {
                debug!(%error, "dropping unroutable query");
                return None;
            }
        };

        let servers = choose(self.config.name_servers(), question.name());
        if servers.is_empty() {
            debug!(query = %question, "no nameserver is responsible");
            return None;
        }

        let mut outstanding = FuturesUnordered::new();
        for server in servers {
            let addr = server.addr();
            let client = self.client_for(addr);
            let buffer = query.to_vec();
            outstanding.push(async move {
                client.rpc(buffer).await.map_err(|error| (addr, error))
            });
        }

        // first response wins; failed upstreams only leave the race, and
        // dropping `outstanding` cancels the losers
        let timeout = P::Timer::delay_for(LOOKUP_TIMEOUT);
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                _ = &mut timeout => {
                    debug!(query = %question, "no answer within the deadline");
                    return None;
                }
                next = outstanding.next() => match next {
                    Some(Ok(response)) => return Some(response),
                    Some(Err((addr, error))) => {
                        debug!(name_server = %addr, %error, "upstream did not answer");
                    }
                    None => {
                        debug!(query = %question, "every upstream failed");
                        return None;
                    }
                },
            }
        }
    }

    /// The client for `addr`, created on first use
    fn client_for(&self, addr: SocketAddr) -> Upstream<P> {
        self.clients
            .lock()
            .expect("clients lock poisoned")
            .entry(addr)
            .or_insert_with(|| Upstream::new(addr, self.protocol, self.provider.clone()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    fn fixture() -> Vec<NameServerConfig> {
        vec![
            NameServerConfig::with_zones(addr("10.0.0.1:53"), vec![name("example.com")]),
            NameServerConfig::with_zones(
                addr("10.0.0.2:53"),
                vec![name("example.com"), name("example.org")],
            ),
            NameServerConfig::new(addr("10.0.0.3:53")),
        ]
    }

    #[test]
    fn test_choose_zoned() {
        let servers = fixture();
        let chosen = choose(&servers, &name("www.example.com"));
        let addrs: Vec<SocketAddr> = chosen.iter().map(|s| s.addr()).collect();
        assert_eq!(addrs, vec![addr("10.0.0.1:53"), addr("10.0.0.2:53")]);
    }

    #[test]
    fn test_choose_single_zone() {
        let servers = fixture();
        let chosen = choose(&servers, &name("mail.example.org"));
        let addrs: Vec<SocketAddr> = chosen.iter().map(|s| s.addr()).collect();
        assert_eq!(addrs, vec![addr("10.0.0.2:53")]);
    }

    #[test]
    fn test_choose_exact_zone_name() {
        let servers = fixture();
        let chosen = choose(&servers, &name("example.com"));
        assert_eq!(chosen.len(), 2);
    }

    #[test]
    fn test_choose_falls_back_to_defaults() {
        let servers = fixture();
        let chosen = choose(&servers, &name("foo.net"));
        let addrs: Vec<SocketAddr> = chosen.iter().map(|s| s.addr()).collect();
        assert_eq!(addrs, vec![addr("10.0.0.3:53")]);
    }

    #[test]
    fn test_choose_no_defaults_is_empty() {
        let servers = vec![NameServerConfig::with_zones(
            addr("10.0.0.1:53"),
            vec![name("example.com")],
        )];
        assert!(choose(&servers, &name("foo.net")).is_empty());
    }

    #[test]
    fn test_zone_is_label_suffix_not_substring() {
        let servers = fixture();
        let chosen = choose(&servers, &name("badexample.com"));
        let addrs: Vec<SocketAddr> = chosen.iter().map(|s| s.addr()).collect();
        assert_eq!(addrs, vec![addr("10.0.0.3:53")]);
    }

    #[test]
    fn test_defaults_do_not_match_by_zone() {
        // a zoneless server never matches as a zoned server, even when
        // zoned servers exist for other names
        let servers = fixture();
        let chosen = choose(&servers, &name("www.example.com"));
        assert!(chosen.iter().all(|s| !s.is_default()));
    }
}
