// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Mock nameservers and hand-built wire messages for the forwarding tests.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;

use butternut_proto::tcp::TcpConnection;
use butternut_proto::xfer::DnsConnection;

/// Builds a single-question `A IN` query
pub fn query_bytes(id: u16, name: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&id.to_be_bytes());
    buf.extend_from_slice(&[0x01, 0x00]); // recursion desired
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
    for label in name.split('.') {
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
    buf.extend_from_slice(&[0, 1, 0, 1]); // A IN
    buf
}

/// Builds the answer a mock nameserver returns: the query, with the response
/// flag set and one A record pointing back at the question name
pub fn a_response(query: &[u8], addr: Ipv4Addr) -> Vec<u8> {
    let mut buf = query.to_vec();
    buf[2] |= 0x80; // QR
    buf[6..8].copy_from_slice(&1u16.to_be_bytes()); // one answer

    buf.extend_from_slice(&[0xc0, 0x0c]); // name: pointer to the question
    buf.extend_from_slice(&[0, 1, 0, 1]); // A IN
    buf.extend_from_slice(&60u32.to_be_bytes()); // ttl
    buf.extend_from_slice(&4u16.to_be_bytes()); // rdlength
    buf.extend_from_slice(&addr.octets());
    buf
}

/// Extracts the address of the first A record of a response
pub fn first_a_record(response: &[u8]) -> Option<Ipv4Addr> {
    let answer_count = u16::from_be_bytes([response[6], response[7]]);
    if answer_count == 0 {
        return None;
    }

    // skip the question: name, type, class
    let mut at = 12;
    while response[at] != 0 {
        at += response[at] as usize + 1;
    }
    at += 1 + 4;

    // answer name: either a pointer or inline labels
    if response[at] & 0xc0 == 0xc0 {
        at += 2;
    } else {
        while response[at] != 0 {
            at += response[at] as usize + 1;
        }
        at += 1;
    }

    let record_type = u16::from_be_bytes([response[at], response[at + 1]]);
    if record_type != 1 {
        return None;
    }
    at += 2 + 2 + 4; // type, class, ttl

    let rdlength = u16::from_be_bytes([response[at], response[at + 1]]) as usize;
    if rdlength != 4 {
        return None;
    }
    at += 2;

    Some(Ipv4Addr::new(
        response[at],
        response[at + 1],
        response[at + 2],
        response[at + 3],
    ))
}

/// A scripted localhost nameserver.
///
/// Answers every query with one fixed A record after an optional delay, or
/// swallows queries entirely; counts what it receives either way.
pub struct MockNameServer {
    addr: SocketAddr,
    queries: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockNameServer {
    /// Serve over UDP
    pub async fn udp(answer: Option<Ipv4Addr>, delay: Duration) -> Self {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let addr = socket.local_addr().unwrap();
        let queries = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn({
            let queries = Arc::clone(&queries);
            async move {
                let mut buf = [0u8; 4096];
                loop {
                    let (len, src) = socket.recv_from(&mut buf).await.unwrap();
                    queries.fetch_add(1, Ordering::SeqCst);

                    let Some(answer) = answer else { continue };
                    let response = a_response(&buf[..len], answer);
                    let socket = Arc::clone(&socket);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = socket.send_to(&response, src).await;
                    });
                }
            }
        });

        Self {
            addr,
            queries,
            task,
        }
    }

    /// Serve over TCP with RFC 1035 length framing
    pub async fn tcp(answer: Option<Ipv4Addr>, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let queries = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn({
            let queries = Arc::clone(&queries);
            async move {
                loop {
                    let (stream, _src) = listener.accept().await.unwrap();
                    let queries = Arc::clone(&queries);
                    tokio::spawn(async move {
                        let conn = Arc::new(TcpConnection::new(stream));
                        while let Ok(query) = conn.read().await {
                            queries.fetch_add(1, Ordering::SeqCst);

                            let Some(answer) = answer else { continue };
                            let response = a_response(&query, answer);
                            let conn = Arc::clone(&conn);
                            tokio::spawn(async move {
                                tokio::time::sleep(delay).await;
                                let _ = conn.write(&response).await;
                            });
                        }
                    });
                }
            }
        });

        Self {
            addr,
            queries,
            task,
        }
    }

    /// Where the nameserver listens
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// How many queries were delivered to this nameserver
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl Drop for MockNameServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
