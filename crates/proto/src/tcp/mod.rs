// Copyright 2015-2016 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! TCP protocol related components for DNS: framing DNS messages over a byte
//! stream per [RFC 1035 §4.2.2](https://tools.ietf.org/html/rfc1035).

mod tcp_stream;

pub use self::tcp_stream::TcpConnection;
