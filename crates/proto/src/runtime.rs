// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Abstractions over the async runtime, clocks and transports.
//!
//! The upstream client and the forwarding engine are generic over a
//! [`RuntimeProvider`], which supplies the TCP/UDP transports and the timer.
//! Production uses [`TokioRuntimeProvider`]; tests substitute in-memory pipes
//! and a paused clock.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream as TokioTcpStream, UdpSocket as TokioUdpSocket};

/// Generic Time for Delay and Timeout.
// This trait is created to allow to use different types of time systems.
#[async_trait]
pub trait Time: Send + Sync + Unpin + 'static {
    /// Return a type that implements `Future` that will wait until the specified duration has
    /// elapsed.
    async fn delay_for(duration: Duration);

    /// Return a type that implement `Future` to complete before the specified duration has elapsed.
    async fn timeout<F: 'static + Future + Send>(
        duration: Duration,
        future: F,
    ) -> Result<F::Output, std::io::Error>;
}

/// New type which is implemented using tokio::time::{Delay, Timeout}
#[derive(Clone, Copy, Debug)]
pub struct TokioTime;

#[async_trait]
impl Time for TokioTime {
    async fn delay_for(duration: Duration) {
        tokio::time::sleep(duration).await
    }

    async fn timeout<F: 'static + Future + Send>(
        duration: Duration,
        future: F,
    ) -> Result<F::Output, std::io::Error> {
        tokio::time::timeout(duration, future)
            .await
            .map_err(move |_| std::io::Error::new(std::io::ErrorKind::TimedOut, "future timed out"))
    }
}

/// Trait for stream-oriented (TCP-like) connections to a nameserver
pub trait DnsTcpStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> DnsTcpStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Trait for a connected datagram (UDP-like) socket to a nameserver
#[async_trait]
pub trait DnsUdpSocket: Send + Sync + Unpin + 'static {
    /// Receive the next datagram from the connected peer into `buf`, returning its length
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Send `buf` as one datagram to the connected peer, returning the number of bytes sent
    async fn send(&self, buf: &[u8]) -> io::Result<usize>;
}

#[async_trait]
impl DnsUdpSocket for TokioUdpSocket {
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        Self::recv(self, buf).await
    }

    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        Self::send(self, buf).await
    }
}

/// Abstraction over the transports and clock an upstream client runs on.
///
/// Transport construction returns boxed futures so implementations stay
/// object-simple; connections themselves are cheap to box once per upstream.
pub trait RuntimeProvider: Clone + Send + Sync + Unpin + 'static {
    /// Timer implementation for this provider
    type Timer: Time;
    /// Stream transport used for TCP upstreams
    type Tcp: DnsTcpStream;
    /// Datagram transport used for UDP upstreams
    type Udp: DnsUdpSocket;

    /// Open a TCP connection to `server_addr`
    fn connect_tcp(
        &self,
        server_addr: SocketAddr,
    ) -> Pin<Box<dyn Future<Output = io::Result<Self::Tcp>> + Send>>;

    /// Bind an ephemeral UDP socket and connect it to `server_addr`
    fn bind_udp(
        &self,
        server_addr: SocketAddr,
    ) -> Pin<Box<dyn Future<Output = io::Result<Self::Udp>> + Send>>;
}

/// The production provider, implemented over the tokio reactor
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioRuntimeProvider;

impl TokioRuntimeProvider {
    /// Constructs a provider over the current tokio runtime
    pub fn new() -> Self {
        Self
    }
}

impl RuntimeProvider for TokioRuntimeProvider {
    type Timer = TokioTime;
    type Tcp = TokioTcpStream;
    type Udp = TokioUdpSocket;

    fn connect_tcp(
        &self,
        server_addr: SocketAddr,
    ) -> Pin<Box<dyn Future<Output = io::Result<Self::Tcp>> + Send>> {
        Box::pin(TokioTcpStream::connect(server_addr))
    }

    fn bind_udp(
        &self,
        server_addr: SocketAddr,
    ) -> Pin<Box<dyn Future<Output = io::Result<Self::Udp>> + Send>> {
        // the wildcard bind keeps the local port out of the caller's hands, the
        // connect filters inbound datagrams to the server we are talking to
        let local = if server_addr.is_ipv4() {
            SocketAddr::from(([0u8; 4], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        Box::pin(async move {
            let socket = TokioUdpSocket::bind(local).await?;
            socket.connect(server_addr).await?;
            Ok(socket)
        })
    }
}
