// Copyright 2015-2021 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Operations to inspect DNS messages: the header, and the question section.
//!
//! The proxy treats messages as opaque buffers beyond the fields it must
//! route on, so only decoding is implemented here.

mod header;
pub mod message;
mod query;
mod response_code;

pub use self::header::{Header, MessageType};
pub use self::query::Query;
pub use self::response_code::ResponseCode;
