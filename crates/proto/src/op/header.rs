// Copyright 2015-2021 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Message metadata

use std::fmt;

use crate::error::ProtoResult;
use crate::op::response_code::ResponseCode;
use crate::serialize::binary::{BinDecodable, BinDecoder};

/// Metadata for the `Message` struct.
///
/// [RFC 1035, DOMAIN NAMES - IMPLEMENTATION AND SPECIFICATION, November 1987](https://tools.ietf.org/html/rfc1035)
///
/// ```text
/// 4.1.1. Header section format
///
/// The header contains the following fields
///
///                                    1  1  1  1  1  1
///      0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      ID                       |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |QR|   Opcode  |AA|TC|RD|RA| Z|AD|CD|   RCODE   |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    QDCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ANCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    NSCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ARCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// Decode-only: the proxy reads ids and counts, it never builds headers.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Header {
    id: u16,
    message_type: MessageType,
    response_code: ResponseCode,
    query_count: u16,
    answer_count: u16,
    name_server_count: u16,
    additional_count: u16,
}

/// Message types are either Query or Response
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MessageType {
    /// Queries are Client requests
    Query,
    /// Response message from the Server or upstream Resolver
    Response,
}

impl Header {
    /// Length of the header, always 12 bytes
    pub const fn len() -> usize {
        12
    }

    /// The transaction id, used to pair a response to its request
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Whether this message is a query or a response
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// The response code carried in the low bits of the flags word
    pub fn response_code(&self) -> ResponseCode {
        self.response_code
    }

    /// Number of entries in the question section
    pub fn query_count(&self) -> u16 {
        self.query_count
    }

    /// Number of entries in the answer section
    pub fn answer_count(&self) -> u16 {
        self.answer_count
    }

    /// Number of entries in the authority section
    pub fn name_server_count(&self) -> u16 {
        self.name_server_count
    }

    /// Number of entries in the additional section
    pub fn additional_count(&self) -> u16 {
        self.additional_count
    }
}

impl<'r> BinDecodable<'r> for Header {
    fn read(decoder: &mut BinDecoder<'r>) -> ProtoResult<Self> {
        let id = decoder.read_u16()?;
        let flags = decoder.read_u16()?;

        let message_type = if flags & 0x8000 != 0 {
            MessageType::Response
        } else {
            MessageType::Query
        };
        let response_code = ResponseCode::from((flags & 0x000f) as u8);

        Ok(Self {
            id,
            message_type,
            response_code,
            query_count: decoder.read_u16()?,
            answer_count: decoder.read_u16()?,
            name_server_count: decoder.read_u16()?,
            additional_count: decoder.read_u16()?,
        })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "{id}:{message_type:?}:{code}:{queries}/{answers}/{authorities}/{additionals}",
            id = self.id,
            message_type = self.message_type,
            code = self.response_code,
            queries = self.query_count,
            answers = self.answer_count,
            authorities = self.name_server_count,
            additionals = self.additional_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read() {
        let raw = [
            0x12u8, 0x34, // id
            0x81, 0x83, // response, rd/ra, NXDomain
            0x00, 0x01, // 1 query
            0x00, 0x00, // 0 answers
            0x00, 0x01, // 1 authority
            0x00, 0x00, // 0 additionals
        ];

        let header = Header::from_bytes(&raw).unwrap();
        assert_eq!(header.id(), 0x1234);
        assert_eq!(header.message_type(), MessageType::Response);
        assert_eq!(header.response_code(), ResponseCode::NXDomain);
        assert_eq!(header.query_count(), 1);
        assert_eq!(header.name_server_count(), 1);
    }

    #[test]
    fn test_read_truncated() {
        let raw = [0u8; 11];
        assert!(Header::from_bytes(&raw).unwrap_err().is_eof());
    }
}
