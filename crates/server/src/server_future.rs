// Copyright 2015-2017 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use butternut_proto::runtime::RuntimeProvider;
use butternut_proto::tcp::TcpConnection;
use butternut_proto::xfer::{DnsConnection, Protocol};

use crate::config::ForwardConfig;
use crate::error::{Error, Result};
use crate::forwarder::Forwarder;

/// Largest downstream datagram the listener accepts; the usual EDNS ceiling
const MAX_UDP_REQUEST: usize = 4_096;

/// The client-facing side of the proxy.
///
/// Sockets are bound by the caller and registered here; each registration
/// spawns its accept/receive loop. The UDP listener forwards over UDP and
/// the TCP listener over TCP, each with its own engine instance.
pub struct ServerFuture<P: RuntimeProvider> {
    udp_forwarder: Arc<Forwarder<P>>,
    tcp_forwarder: Arc<Forwarder<P>>,
    joins: Vec<JoinHandle<()>>,
}

impl<P: RuntimeProvider> ServerFuture<P> {
    /// Creates a server over `config`; transports come from `provider`
    pub fn new(config: Arc<ForwardConfig>, provider: P) -> Self {
        Self {
            udp_forwarder: Arc::new(Forwarder::new(
                Arc::clone(&config),
                Protocol::Udp,
                provider.clone(),
            )),
            tcp_forwarder: Arc::new(Forwarder::new(config, Protocol::Tcp, provider)),
            joins: Vec::new(),
        }
    }

    /// Register a UDP socket. Should be bound before calling this function.
    ///
    /// Every datagram is one query, handled in its own task; queries the
    /// engine cannot answer are dropped silently and the downstream retries.
    pub fn register_socket(&mut self, socket: net::UdpSocket) {
        debug!("registering udp: {:?}", socket);

        let socket = Arc::new(socket);
        let forwarder = Arc::clone(&self.udp_forwarder);

        self.joins.push(tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_UDP_REQUEST];
            loop {
                let (len, src) = match socket.recv_from(&mut buffer).await {
                    Ok(received) => received,
                    Err(error) => {
                        warn!(%error, "error receiving request on udp socket");
                        continue;
                    }
                };
                debug!("received udp request from: {}", src);

                let query = buffer[..len].to_vec();
                let socket = Arc::clone(&socket);
                let forwarder = Arc::clone(&forwarder);
                tokio::spawn(async move {
                    if let Some(response) = forwarder.answer(&query).await {
                        if let Err(error) = socket.send_to(&response, src).await {
                            debug!(%error, "failed to respond to {}", src);
                        }
                    }
                });
            }
        }));
    }

    /// Register a TcpListener to the Server. This should already be bound to
    /// either an IPv6 or an IPv4 address.
    ///
    /// Connections are long-lived: requests on one connection are handled
    /// serially, which preserves per-connection response order; connections
    /// are concurrent with each other. A framing error ends only its own
    /// connection.
    pub fn register_listener(&mut self, listener: net::TcpListener) {
        debug!("registering tcp: {:?}", listener);

        let forwarder = Arc::clone(&self.tcp_forwarder);

        self.joins.push(tokio::spawn(async move {
            loop {
                let (stream, src) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(error) => {
                        debug!(%error, "error accepting tcp connection");
                        continue;
                    }
                };
                debug!("accepted request from: {}", src);

                let forwarder = Arc::clone(&forwarder);
                tokio::spawn(async move {
                    let conn = TcpConnection::new(stream);
                    loop {
                        let query = match conn.read().await {
                            Ok(query) => query,
                            Err(error) if error.is_eof() => break,
                            Err(error) => {
                                debug!(%error, "closing connection from {}", src);
                                break;
                            }
                        };

                        if let Some(response) = forwarder.answer(&query).await {
                            if let Err(error) = conn.write(&response).await {
                                debug!(%error, "closing connection from {}", src);
                                break;
                            }
                        }
                    }
                });
            }
        }));
    }

    /// This will run until all background tasks of the server end.
    pub async fn block_until_done(self) -> Result<()> {
        for join in self.joins {
            join.await
                .map_err(|error| Error::Msg(format!("listener task failed: {error}")))?;
        }
        Ok(())
    }
}

/// Binds the client-facing UDP socket
pub async fn bind_udp(addr: SocketAddr) -> Result<net::UdpSocket> {
    net::UdpSocket::bind(addr).await.map_err(Error::Bind)
}

/// Binds the client-facing TCP listener
pub async fn bind_tcp(addr: SocketAddr) -> Result<net::TcpListener> {
    net::TcpListener::bind(addr).await.map_err(Error::Bind)
}
