// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `Upstream` multiplexes concurrent requests onto one persistent connection
//! to a nameserver.
//!
//! Each request is assigned a connection-scoped transaction id from an
//! [`IdPool`] and parked in a pending table; a dispatcher task owns the read
//! side of the connection and completes requests as their responses arrive.
//! The caller's original transaction id is restored before the response is
//! handed back, so the remapping is invisible from the outside.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{ProtoErrorKind, ProtoResult};
use crate::op::message;
use crate::runtime::{RuntimeProvider, Time};
use crate::tcp::TcpConnection;
use crate::udp::UdpConnection;
use crate::xfer::{DnsConnection, IdPool, Protocol};

/// A connection with no new requests for this long is torn down
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

type CompletionSlot = oneshot::Sender<ProtoResult<Vec<u8>>>;

/// State shared between request futures, the dispatcher and the idle timer.
///
/// The dispatcher and timer tasks hold this only weakly: the client state
/// owns their cancellation handles, so an owning reference back would pin the
/// whole client alive from inside its own background task.
struct Shared {
    name_server: SocketAddr,
    protocol: Protocol,
    conn: Mutex<ConnState>,
    pending: StdMutex<HashMap<u16, CompletionSlot>>,
    ids: IdPool,
    /// Bumped on every connect and disconnect, only ever under the `conn`
    /// lock. A dispatcher or idle timer belonging to an older generation
    /// must not touch the current connection, and a response read from a
    /// dead connection must not complete a request whose id was reissued:
    /// the dispatcher re-checks this under the `pending` lock before it
    /// delivers.
    generation: AtomicU64,
}

#[derive(Default)]
struct ConnState {
    conn: Option<Arc<dyn DnsConnection>>,
    dispatcher: Option<JoinHandle<()>>,
    idle: Option<JoinHandle<()>>,
}

impl Drop for ConnState {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
        if let Some(idle) = self.idle.take() {
            idle.abort();
        }
    }
}

/// A multiplexing client for a single upstream nameserver.
///
/// Constructing one performs no I/O; the connection is established on the
/// first [`rpc`](Self::rpc) and recycled across requests until it breaks or
/// sits idle for 30 seconds.
#[derive(Clone)]
pub struct Upstream<P: RuntimeProvider> {
    shared: Arc<Shared>,
    provider: P,
}

impl<P: RuntimeProvider> Upstream<P> {
    /// Creates the client state for `name_server`; does not open a socket
    pub fn new(name_server: SocketAddr, protocol: Protocol, provider: P) -> Self {
        Self {
            shared: Arc::new(Shared {
                name_server,
                protocol,
                conn: Mutex::new(ConnState::default()),
                pending: StdMutex::new(HashMap::new()),
                ids: IdPool::new(),
                generation: AtomicU64::new(0),
            }),
            provider,
        }
    }

    /// The address of the upstream nameserver
    pub fn name_server(&self) -> SocketAddr {
        self.shared.name_server
    }

    /// Send one query and return its response.
    ///
    /// The query's transaction id is rewritten to a connection-scoped id for
    /// the wire and restored on the response. Suspends while the connection
    /// is established, while the id space is exhausted, and while the
    /// response is outstanding; the caller owns any deadline.
    ///
    /// A write onto a broken connection is retried exactly once, against a
    /// freshly established connection and under a fresh id: the original id
    /// belongs to the connection that died with it.
    pub async fn rpc(&self, mut query: Vec<u8>) -> ProtoResult<Vec<u8>> {
        let client_id =
            message::id(&query).map_err(|_| ProtoErrorKind::Message("failed to parse request"))?;
        message::single_query(&query)
            .map_err(|_| ProtoErrorKind::Message("failed to parse request"))?;

        let (request, completion) = self.register(&mut query).await?;

        if let Err(error) = self.send(&query).await {
            debug!(
                name_server = %self.shared.name_server,
                %error,
                "write failed, reconnecting"
            );
            // the disconnect below fails every parked request, this one
            // included; the replay must re-register afterwards
            self.disconnect().await;
            drop(request);
            drop(completion);

            let (request, completion) = self.register(&mut query).await?;
            self.send(&query).await?;
            return self.complete(request, completion, client_id).await;
        }

        self.complete(request, completion, client_id).await
    }

    /// Tear down the connection, if any, failing every outstanding request.
    ///
    /// Idempotent; a subsequent `rpc` reconnects lazily.
    pub async fn disconnect(&self) {
        disconnect_shared(&self.shared, None).await;
    }

    /// True when a connection is currently established
    pub async fn is_connected(&self) -> bool {
        self.shared.conn.lock().await.conn.is_some()
    }

    /// The number of requests currently awaiting a response
    pub fn active_requests(&self) -> usize {
        self.shared
            .pending
            .lock()
            .expect("pending lock poisoned")
            .len()
    }

    /// The number of transaction ids not currently in flight
    pub fn available_ids(&self) -> usize {
        self.shared.ids.available()
    }

    /// Draw an id, patch it into the query and park a completion slot for it
    async fn register(
        &self,
        query: &mut [u8],
    ) -> ProtoResult<(PendingRequest, oneshot::Receiver<ProtoResult<Vec<u8>>>)> {
        let id = self.shared.ids.get().await;
        if let Err(e) = message::set_id(query, id) {
            self.shared.ids.put(id);
            return Err(e);
        }

        let (slot, completion) = oneshot::channel();
        let previous = self
            .shared
            .pending
            .lock()
            .expect("pending lock poisoned")
            .insert(id, slot);
        debug_assert!(previous.is_none(), "id {id} was allocated while in flight");

        let request = PendingRequest {
            shared: Arc::clone(&self.shared),
            id,
        };
        Ok((request, completion))
    }

    async fn send(&self, query: &[u8]) -> ProtoResult<()> {
        let conn = self.get_conn().await?;
        conn.write(query).await
    }

    /// Await the response and swap the caller's transaction id back in
    async fn complete(
        &self,
        request: PendingRequest,
        completion: oneshot::Receiver<ProtoResult<Vec<u8>>>,
        client_id: u16,
    ) -> ProtoResult<Vec<u8>> {
        let result = completion.await;
        drop(request);

        let mut response = match result {
            Ok(response) => response?,
            // the slot was dropped without resolving
            Err(_) => return Err(ProtoErrorKind::Closed.into()),
        };

        message::set_id(&mut response, client_id)?;
        Ok(response)
    }

    /// Returns the live connection, establishing one if necessary, and
    /// re-arms the idle disconnect.
    async fn get_conn(&self) -> ProtoResult<Arc<dyn DnsConnection>> {
        let mut state = self.shared.conn.lock().await;

        if let Some(idle) = state.idle.take() {
            idle.abort();
        }

        let conn = match state.conn.as_ref() {
            Some(conn) => Arc::clone(conn),
            None => {
                let conn = self.connect_transport().await?;
                debug!(
                    name_server = %self.shared.name_server,
                    protocol = %self.shared.protocol,
                    "connected"
                );

                let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
                state.dispatcher = Some(tokio::spawn(dispatch(
                    Arc::downgrade(&self.shared),
                    Arc::clone(&conn),
                    generation,
                )));
                state.conn = Some(Arc::clone(&conn));
                conn
            }
        };

        let generation = self.shared.generation.load(Ordering::SeqCst);
        let weak = Arc::downgrade(&self.shared);
        state.idle = Some(tokio::spawn(async move {
            P::Timer::delay_for(IDLE_TIMEOUT).await;
            if let Some(shared) = weak.upgrade() {
                debug!(name_server = %shared.name_server, "idle, disconnecting");
                disconnect_shared(&shared, Some(generation)).await;
            }
        }));

        Ok(conn)
    }

    async fn connect_transport(&self) -> ProtoResult<Arc<dyn DnsConnection>> {
        match self.shared.protocol {
            Protocol::Udp => {
                let socket = self.provider.bind_udp(self.shared.name_server).await?;
                Ok(Arc::new(UdpConnection::new(socket)))
            }
            Protocol::Tcp => {
                let stream = self.provider.connect_tcp(self.shared.name_server).await?;
                Ok(Arc::new(TcpConnection::new(stream)))
            }
        }
    }
}

/// An entry in the pending table, tied to its cleanup.
///
/// Whoever removes the entry from the table returns the id to the pool:
/// normally the dispatcher or a disconnect, but when the request future is
/// dropped first — a lost race, a caller timeout — this guard is the one
/// that cleans up.
struct PendingRequest {
    shared: Arc<Shared>,
    id: u16,
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        let removed = self
            .shared
            .pending
            .lock()
            .expect("pending lock poisoned")
            .remove(&self.id);
        if removed.is_some() {
            self.shared.ids.put(self.id);
        }
    }
}

/// Tear down the current connection and fail every parked request.
///
/// `generation` scopes the teardown: a stale dispatcher or idle timer passes
/// the generation it belongs to and becomes a no-op once a newer connection
/// exists. `None` always disconnects.
async fn disconnect_shared(shared: &Shared, generation: Option<u64>) {
    let mut state = shared.conn.lock().await;
    if let Some(generation) = generation {
        if shared.generation.load(Ordering::SeqCst) != generation {
            return;
        }
    }
    if state.conn.is_none() {
        return;
    }

    state.conn = None;
    // the bump happens before the drain: a dispatcher still holding a
    // response from this connection sees it and discards rather than
    // completing a request whose id has been reissued
    shared.generation.fetch_add(1, Ordering::SeqCst);
    if let Some(dispatcher) = state.dispatcher.take() {
        // when called from the dispatcher itself this only flags the task;
        // everything below runs without suspension points, so the cleanup
        // still completes before the cancellation can land
        dispatcher.abort();
    }
    if let Some(idle) = state.idle.take() {
        idle.abort();
    }

    let parked: Vec<(u16, CompletionSlot)> = shared
        .pending
        .lock()
        .expect("pending lock poisoned")
        .drain()
        .collect();
    for (id, slot) in parked {
        shared.ids.put(id);
        let _ = slot.send(Err(ProtoErrorKind::Closed.into()));
    }
}

/// The long-lived read loop of one connection: demultiplexes responses to
/// their parked requests by transaction id.
async fn dispatch(shared: Weak<Shared>, conn: Arc<dyn DnsConnection>, generation: u64) {
    loop {
        let buffer = match conn.read().await {
            Ok(buffer) => buffer,
            Err(error) => {
                match shared.upgrade() {
                    Some(shared) if error.is_eof() => {
                        debug!(name_server = %shared.name_server, "stream closed")
                    }
                    Some(shared) => {
                        warn!(name_server = %shared.name_server, %error, "receive failed")
                    }
                    None => return,
                }
                break;
            }
        };

        // a response that cannot carry a header cannot be paired with a
        // request; treat the connection as poisoned
        let header = match message::header(&buffer) {
            Ok(header) => header,
            Err(error) => {
                warn!(%error, "malformed response, dropping connection");
                break;
            }
        };

        let Some(shared) = shared.upgrade() else {
            return;
        };

        let slot = {
            let mut pending = shared.pending.lock().expect("pending lock poisoned");
            if shared.generation.load(Ordering::SeqCst) != generation {
                // torn down while this response was in hand; its id may
                // already belong to a request on the next connection
                return;
            }
            pending.remove(&header.id())
        };
        match slot {
            Some(slot) => {
                shared.ids.put(header.id());
                // the requester may have given up mid-race; that is its right
                let _ = slot.send(Ok(buffer));
            }
            // duplicates and late answers arrive here; they do not kill the
            // connection
            None => debug!(id = header.id(), "unexpected response id, dropping"),
        }
    }

    if let Some(shared) = shared.upgrade() {
        disconnect_shared(&shared, Some(generation)).await;
    }
}
