// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Butternut-Proto is the wire-level library of the Butternut DNS forwarding
//! proxy.
//!
//! It frames DNS messages over UDP and TCP transports, decodes the few
//! message fields a forwarder must route on, and multiplexes concurrent
//! requests onto persistent upstream connections with transaction-id
//! remapping (see [`xfer::Upstream`]).

#![warn(
    clippy::default_trait_access,
    clippy::dbg_macro,
    clippy::unimplemented,
    missing_copy_implementations,
    missing_docs,
    non_snake_case,
    non_upper_case_globals,
    rust_2018_idioms,
    unreachable_pub
)]
#![allow(clippy::upper_case_acronyms)]

pub mod error;
pub mod op;
pub mod rr;
pub mod runtime;
pub mod serialize;
pub mod tcp;
pub mod udp;
pub mod xfer;

pub use crate::error::{ProtoError, ProtoErrorKind, ProtoResult};
