// Copyright 2015-2021 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Query struct for looking up resource records

use std::fmt;

use crate::error::ProtoResult;
use crate::rr::{DNSClass, Name, RecordType};
use crate::serialize::binary::{BinDecodable, BinDecoder};

/// Query struct for looking up resource records, basically a resource record
/// header without the response data.
///
/// [RFC 1035, DOMAIN NAMES - IMPLEMENTATION AND SPECIFICATION, November 1987](https://tools.ietf.org/html/rfc1035)
///
/// ```text
/// 4.1.2. Question section format
///
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                                               |
///     /                     QNAME                     /
///     /                                               /
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                     QTYPE                     |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                     QCLASS                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Query {
    name: Name,
    query_type: RecordType,
    query_class: DNSClass,
}

impl Query {
    /// The name being looked up
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// The type of the query
    pub fn query_type(&self) -> RecordType {
        self.query_type
    }

    /// The class of the query
    pub fn query_class(&self) -> DNSClass {
        self.query_class
    }
}

impl<'r> BinDecodable<'r> for Query {
    fn read(decoder: &mut BinDecoder<'r>) -> ProtoResult<Self> {
        let name = Name::read(decoder)?;
        let query_type = RecordType::from(decoder.read_u16()?);
        let query_class = DNSClass::from(decoder.read_u16()?);

        Ok(Self {
            name,
            query_type,
            query_class,
        })
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "{name} {class} {ty}",
            name = self.name,
            class = self.query_class,
            ty = self.query_type,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read() {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"\x03foo\x03com\x00");
        raw.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // A IN

        let query = Query::from_bytes(&raw).unwrap();
        assert_eq!(query.name(), &Name::from_ascii("foo.com").unwrap());
        assert_eq!(query.query_type(), RecordType::A);
        assert_eq!(query.query_class(), DNSClass::IN);
    }
}
