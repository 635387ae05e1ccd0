// Copyright 2015-2021 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Buffer-level views into a DNS message.
//!
//! The proxy rewrites only the transaction id, bytes `[0..2)` of a message,
//! and routes on the first question; everything else stays opaque.

use crate::error::{ProtoErrorKind, ProtoResult};
use crate::op::{Header, Query};
use crate::serialize::binary::{BinDecodable, BinDecoder};

/// Reads the transaction id of the message without decoding the full header
pub fn id(buffer: &[u8]) -> ProtoResult<u16> {
    if buffer.len() < 2 {
        return Err(ProtoErrorKind::Eof.into());
    }
    Ok(u16::from_be_bytes([buffer[0], buffer[1]]))
}

/// Overwrites the transaction id of the message, network byte order
pub fn set_id(buffer: &mut [u8], id: u16) -> ProtoResult<()> {
    if buffer.len() < 2 {
        return Err(ProtoErrorKind::Eof.into());
    }
    buffer[0..2].copy_from_slice(&id.to_be_bytes());
    Ok(())
}

/// Decodes the header of the message
pub fn header(buffer: &[u8]) -> ProtoResult<Header> {
    Header::from_bytes(buffer)
}

/// Decodes the single question a forwardable query must carry.
///
/// Messages with zero or more than one question are refused with
/// `BadQueryCount`; they are never routed.
pub fn single_query(buffer: &[u8]) -> ProtoResult<Query> {
    let mut decoder = BinDecoder::new(buffer);
    let header = Header::read(&mut decoder)?;

    if header.query_count() != 1 {
        return Err(ProtoErrorKind::BadQueryCount(header.query_count() as usize).into());
    }

    Query::read(&mut decoder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rr::{Name, RecordType};

    fn query_bytes(id: u16, qdcount: u16) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&id.to_be_bytes());
        raw.extend_from_slice(&[0x01, 0x00]); // rd
        raw.extend_from_slice(&qdcount.to_be_bytes());
        raw.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        raw.extend_from_slice(b"\x03foo\x03com\x00\x00\x01\x00\x01");
        raw
    }

    #[test]
    fn test_id_round_trip() {
        let mut raw = query_bytes(0xabcd, 1);
        assert_eq!(id(&raw).unwrap(), 0xabcd);

        set_id(&mut raw, 0x0102).unwrap();
        assert_eq!(id(&raw).unwrap(), 0x0102);
    }

    #[test]
    fn test_single_query() {
        let raw = query_bytes(1, 1);
        let query = single_query(&raw).unwrap();
        assert_eq!(query.name(), &Name::from_ascii("foo.com").unwrap());
        assert_eq!(query.query_type(), RecordType::A);
    }

    #[test]
    fn test_query_count_not_one() {
        let raw = query_bytes(1, 0);
        let err = single_query(&raw).unwrap_err();
        assert!(matches!(err.kind(), ProtoErrorKind::BadQueryCount(0)));

        let raw = query_bytes(1, 2);
        let err = single_query(&raw).unwrap_err();
        assert!(matches!(err.kind(), ProtoErrorKind::BadQueryCount(2)));
    }

    #[test]
    fn test_short_buffer() {
        assert!(id(&[0x01]).is_err());
        assert!(set_id(&mut [0x01], 7).is_err());
    }
}
