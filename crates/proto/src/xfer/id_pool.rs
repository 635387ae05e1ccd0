// Copyright 2015-2021 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A bounded pool of DNS transaction ids.

use std::collections::BTreeSet;
use std::sync::Mutex;

use tokio::sync::Semaphore;

/// Upper bound of in-flight requests per upstream connection; ids are drawn
/// from `1..=MAX_ACTIVE_QUERIES`.
pub const MAX_ACTIVE_QUERIES: usize = 512;

/// A pool of 16-bit transaction identifiers.
///
/// `get` always yields the smallest free id, which keeps the wire protocol
/// reproducible, and suspends when the pool is dry, which is the natural
/// backpressure on a single upstream connection. Ids must be returned with
/// `put` once their request settles.
pub struct IdPool {
    free: Mutex<BTreeSet<u16>>,
    available: Semaphore,
}

impl IdPool {
    /// Construct a full pool
    pub fn new() -> Self {
        Self {
            free: Mutex::new((1..=MAX_ACTIVE_QUERIES as u16).collect()),
            available: Semaphore::new(MAX_ACTIVE_QUERIES),
        }
    }

    /// Take the smallest free id, suspending until one is available.
    pub async fn get(&self) -> u16 {
        let permit = self
            .available
            .acquire()
            .await
            .expect("id pool semaphore closed");
        // the permit is repaid by `put` when the id comes home
        permit.forget();

        let mut free = self.free.lock().expect("id pool poisoned");
        free.pop_first().expect("id pool permit without a free id")
    }

    /// Return `id` to the pool and wake one waiter.
    ///
    /// # Panics
    ///
    /// Returning an id that is already free is a programming error and
    /// panics.
    pub fn put(&self, id: u16) {
        let mut free = self.free.lock().expect("id pool poisoned");
        assert!(free.insert(id), "transaction id {id} returned twice");
        drop(free);

        self.available.add_permits(1);
    }

    /// The number of ids currently free
    pub fn available(&self) -> usize {
        self.free.lock().expect("id pool poisoned").len()
    }
}

impl Default for IdPool {
    fn default() -> Self {
        Self::new()
    }
}
