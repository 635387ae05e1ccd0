// Copyright 2015-2021 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Error types for the server

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use butternut_proto::ProtoError;

/// An alias for results returned by functions of this crate
pub type Result<T> = ::std::result::Result<T, Error>;

/// The error type for errors that get returned in the server crate
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The listen address could not be bound
    #[error("please supply a free port number")]
    Bind(#[source] io::Error),

    /// Two configured name servers share one address
    #[error("duplicate name server address: {0}")]
    DuplicateNameServer(SocketAddr),

    /// An error with an arbitrary message
    #[error("{0}")]
    Msg(String),

    // foreign
    /// An io error occurred
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// An error from the wire-level library
    #[error("proto error: {0}")]
    Proto(#[from] ProtoError),

    /// The configuration file could not be decoded
    #[error("unable to decode the configuration: {0}")]
    Toml(#[from] toml::de::Error),
}
