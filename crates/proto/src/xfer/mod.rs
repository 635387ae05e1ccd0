// Copyright 2015-2021 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! This module contains all the types for demuxing DNS oriented streams.

use std::fmt;

use async_trait::async_trait;

use crate::error::ProtoResult;

mod id_pool;
mod upstream;

pub use self::id_pool::{IdPool, MAX_ACTIVE_QUERIES};
pub use self::upstream::Upstream;

/// The protocol on which a NameServer should be communicated with
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Protocol {
    /// User Datagram Protocol, the default
    Udp,
    /// Transmission Control Protocol, 2-byte length-prefixed framing
    Tcp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Udp => f.write_str("udp"),
            Self::Tcp => f.write_str("tcp"),
        }
    }
}

/// A framed, message-oriented view of a transport: whole DNS messages in,
/// whole DNS messages out.
///
/// Implementations serialize their readers and writers independently, so one
/// task can sit in `read` while others `write`, but two concurrent writers
/// can never interleave a frame.
#[async_trait]
pub trait DnsConnection: Send + Sync + 'static {
    /// Receive the next whole message from the peer
    async fn read(&self) -> ProtoResult<Vec<u8>>;

    /// Send one whole message to the peer
    async fn write(&self, buffer: &[u8]) -> ProtoResult<()>;
}
