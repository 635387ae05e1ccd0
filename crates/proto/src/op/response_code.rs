// Copyright 2015-2021 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! All defined response codes in DNS

use std::fmt;

/// The status code of a response, from the low four bits of the header flags
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ResponseCode {
    /// No Error
    NoError,
    /// Format Error
    FormErr,
    /// Server Failure
    ServFail,
    /// Non-Existent Domain
    NXDomain,
    /// Not Implemented
    NotImp,
    /// Query Refused
    Refused,
    /// A code not matched above
    Unknown(u8),
}

impl From<u8> for ResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::FormErr,
            2 => Self::ServFail,
            3 => Self::NXDomain,
            4 => Self::NotImp,
            5 => Self::Refused,
            _ => Self::Unknown(value),
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(code: ResponseCode) -> Self {
        match code {
            ResponseCode::NoError => 0,
            ResponseCode::FormErr => 1,
            ResponseCode::ServFail => 2,
            ResponseCode::NXDomain => 3,
            ResponseCode::NotImp => 4,
            ResponseCode::Refused => 5,
            ResponseCode::Unknown(value) => value,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::NoError => f.write_str("NoError"),
            Self::FormErr => f.write_str("FormErr"),
            Self::ServFail => f.write_str("ServFail"),
            Self::NXDomain => f.write_str("NXDomain"),
            Self::NotImp => f.write_str("NotImp"),
            Self::Refused => f.write_str("Refused"),
            Self::Unknown(value) => write!(f, "RCODE{value}"),
        }
    }
}
