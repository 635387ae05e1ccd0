// Copyright 2015-2016 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;

use crate::error::{ProtoError, ProtoErrorKind, ProtoResult};
use crate::runtime::DnsTcpStream;
use crate::xfer::DnsConnection;

/// A DNS message framing over a TCP-like byte stream.
///
/// Messages are prefixed with their big-endian 16-bit length. The reader and
/// writer halves are serialized independently: the write lock spans
/// header+payload+flush so a frame is placed on the wire atomically with
/// respect to other writers on the same connection.
pub struct TcpConnection<S: DnsTcpStream> {
    read_half: Mutex<ReadHalf<S>>,
    write_half: Mutex<WriteHalf<S>>,
}

impl<S: DnsTcpStream> TcpConnection<S> {
    /// Wraps an established stream, e.g. a connected TCP socket
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            read_half: Mutex::new(read_half),
            write_half: Mutex::new(write_half),
        }
    }
}

#[async_trait]
impl<S: DnsTcpStream> DnsConnection for TcpConnection<S> {
    async fn read(&self) -> ProtoResult<Vec<u8>> {
        let mut socket = self.read_half.lock().await;

        // length phase: a close on the frame boundary is a clean end of
        // stream, a close inside the prefix is a short read
        let mut len_bytes = [0u8; 2];
        let mut pos = 0;
        while pos < len_bytes.len() {
            let read = socket.read(&mut len_bytes[pos..]).await?;
            if read == 0 {
                return Err(if pos == 0 {
                    ProtoErrorKind::Eof.into()
                } else {
                    ProtoErrorKind::ShortRead.into()
                });
            }
            pos += read;
        }
        let length = u16::from_be_bytes(len_bytes) as usize;

        // message phase
        let mut bytes = vec![0u8; length];
        socket.read_exact(&mut bytes).await.map_err(short_read)?;
        Ok(bytes)
    }

    async fn write(&self, buffer: &[u8]) -> ProtoResult<()> {
        if buffer.len() > u16::MAX as usize {
            return Err(ProtoErrorKind::MaxBufferSizeExceeded(buffer.len()).into());
        }
        let length = u16::to_be_bytes(buffer.len() as u16);

        let mut socket = self.write_half.lock().await;
        socket.write_all(&length).await?;
        socket.write_all(buffer).await?;
        socket.flush().await?;
        Ok(())
    }
}

fn short_read(error: io::Error) -> ProtoError {
    match error.kind() {
        io::ErrorKind::UnexpectedEof => ProtoErrorKind::ShortRead.into(),
        _ => error.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_read_write_round_trip() {
        let (client, server) = tokio::io::duplex(4096);
        let client = TcpConnection::new(client);
        let server = TcpConnection::new(server);

        client.write(b"\x12\x34hello").await.unwrap();
        assert_eq!(server.read().await.unwrap(), b"\x12\x34hello");

        server.write(b"\x12\x34world").await.unwrap();
        assert_eq!(client.read().await.unwrap(), b"\x12\x34world");
    }

    #[tokio::test]
    async fn test_clean_close_is_eof() {
        let (client, server) = tokio::io::duplex(4096);
        let server = TcpConnection::new(server);

        drop(client);
        assert!(server.read().await.unwrap_err().is_eof());
    }

    #[tokio::test]
    async fn test_partial_length_is_short_read() {
        let (mut client, server) = tokio::io::duplex(4096);
        let server = TcpConnection::new(server);

        client.write_all(&[0x00]).await.unwrap();
        drop(client);

        let err = server.read().await.unwrap_err();
        assert_eq!(err.to_string(), "framing: short read");
    }

    #[tokio::test]
    async fn test_truncated_message_is_short_read() {
        let (mut client, server) = tokio::io::duplex(4096);
        let server = TcpConnection::new(server);

        client.write_all(&[0x00, 0x10, b'x']).await.unwrap();
        drop(client);

        let err = server.read().await.unwrap_err();
        assert_eq!(err.to_string(), "framing: short read");
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_interleave() {
        let (client, server) = tokio::io::duplex(64);
        let client = std::sync::Arc::new(TcpConnection::new(client));
        let server = TcpConnection::new(server);

        // frames larger than the pipe capacity force each writer to suspend
        // mid-frame; the write lock must still keep the frames whole
        let first = vec![b'a'; 512];
        let second = vec![b'b'; 512];

        let writers = {
            let client = Arc::clone(&client);
            let (first, second) = (first.clone(), second.clone());
            tokio::spawn(async move {
                let one = client.write(&first);
                let client = Arc::clone(&client);
                let two = async move { client.write(&second).await };
                tokio::try_join!(one, two).unwrap();
            })
        };

        let mut frames = vec![server.read().await.unwrap(), server.read().await.unwrap()];
        frames.sort();
        assert_eq!(frames, vec![first, second]);
        writers.await.unwrap();
    }
}
