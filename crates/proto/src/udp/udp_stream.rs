// Copyright 2015-2016 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{ProtoErrorKind, ProtoResult};
use crate::runtime::DnsUdpSocket;
use crate::xfer::DnsConnection;

/// Largest payload a UDP datagram can carry, 65,535 less the 8-byte UDP header
const MAX_DATAGRAM_PAYLOAD: usize = 65_527;

/// A DNS message framing over a connected datagram socket.
///
/// The datagram boundary is the message boundary, so no length prefix is
/// involved; the locks only keep concurrent readers and writers from
/// competing over the socket.
pub struct UdpConnection<S: DnsUdpSocket> {
    socket: S,
    read_lock: Mutex<()>,
    write_lock: Mutex<()>,
}

impl<S: DnsUdpSocket> UdpConnection<S> {
    /// Wraps a datagram socket connected to the nameserver
    pub fn new(socket: S) -> Self {
        Self {
            socket,
            read_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl<S: DnsUdpSocket> DnsConnection for UdpConnection<S> {
    async fn read(&self) -> ProtoResult<Vec<u8>> {
        let _guard = self.read_lock.lock().await;

        let mut buffer = vec![0u8; u16::MAX as usize];
        let len = self.socket.recv(&mut buffer).await?;
        buffer.truncate(len);
        Ok(buffer)
    }

    async fn write(&self, buffer: &[u8]) -> ProtoResult<()> {
        if buffer.len() > MAX_DATAGRAM_PAYLOAD {
            return Err(ProtoErrorKind::MaxBufferSizeExceeded(buffer.len()).into());
        }

        let _guard = self.write_lock.lock().await;

        let sent = self.socket.send(buffer).await?;
        if sent != buffer.len() {
            return Err(format!("wrote {sent} of {} bytes", buffer.len()).into());
        }
        Ok(())
    }
}
