// Copyright 2015-2021 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! record type definitions

use std::fmt;

/// The type of the resource record, for the subset of types the proxy can name.
///
/// The forwarder never acts on the record type, it is carried for routing
/// diagnostics and tests; unrecognized types round-trip through `Unknown`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum RecordType {
    /// [RFC 1035](https://tools.ietf.org/html/rfc1035) IPv4 Address record
    A,
    /// [RFC 3596](https://tools.ietf.org/html/rfc3596) IPv6 address record
    AAAA,
    /// [RFC 1035](https://tools.ietf.org/html/rfc1035) All cached records
    ANY,
    /// [RFC 1035](https://tools.ietf.org/html/rfc1035) Canonical name record
    CNAME,
    /// [RFC 1035](https://tools.ietf.org/html/rfc1035) Mail exchange record
    MX,
    /// [RFC 1035](https://tools.ietf.org/html/rfc1035) Name server record
    NS,
    /// [RFC 1035](https://tools.ietf.org/html/rfc1035) Pointer record
    PTR,
    /// [RFC 1035](https://tools.ietf.org/html/rfc1035) Start of authority record
    SOA,
    /// [RFC 2782](https://tools.ietf.org/html/rfc2782) Service locator
    SRV,
    /// [RFC 1035](https://tools.ietf.org/html/rfc1035) Text record
    TXT,
    /// Unknown Record type, or unsupported
    Unknown(u16),
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => Self::A,
            28 => Self::AAAA,
            255 => Self::ANY,
            5 => Self::CNAME,
            15 => Self::MX,
            2 => Self::NS,
            12 => Self::PTR,
            6 => Self::SOA,
            33 => Self::SRV,
            16 => Self::TXT,
            _ => Self::Unknown(value),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(rt: RecordType) -> Self {
        match rt {
            RecordType::A => 1,
            RecordType::AAAA => 28,
            RecordType::ANY => 255,
            RecordType::CNAME => 5,
            RecordType::MX => 15,
            RecordType::NS => 2,
            RecordType::PTR => 12,
            RecordType::SOA => 6,
            RecordType::SRV => 33,
            RecordType::TXT => 16,
            RecordType::Unknown(value) => value,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::A => f.write_str("A"),
            Self::AAAA => f.write_str("AAAA"),
            Self::ANY => f.write_str("ANY"),
            Self::CNAME => f.write_str("CNAME"),
            Self::MX => f.write_str("MX"),
            Self::NS => f.write_str("NS"),
            Self::PTR => f.write_str("PTR"),
            Self::SOA => f.write_str("SOA"),
            Self::SRV => f.write_str("SRV"),
            Self::TXT => f.write_str("TXT"),
            Self::Unknown(value) => write!(f, "TYPE{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u16_round_trip() {
        for value in 0..=300u16 {
            assert_eq!(u16::from(RecordType::from(value)), value);
        }
    }
}
