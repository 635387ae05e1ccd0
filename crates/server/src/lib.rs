// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Butternut-Server hosts the forwarding engine of the Butternut DNS proxy.
//!
//! Queries arriving over UDP or TCP are routed by zone to the configured
//! upstream nameservers ([`forwarder::choose`]), fanned out, and the first
//! answer within the deadline goes back to the client.

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

pub mod config;
pub mod error;
pub mod forwarder;
mod server_future;

pub use self::error::{Error, Result};
pub use self::server_future::{bind_tcp, bind_udp, ServerFuture};
