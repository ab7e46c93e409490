// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Item-scoped critical sections.
//!
//! Accepting an offer reads every accepted offer of the item and may then
//! reject several of them. That scatter write must see a consistent view of
//! "who is currently accepted", so every mutating operation on an item's
//! offers runs while holding the item's lock.

use crate::base::ItemRef;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// One mutex per item, created on first use.
///
/// Entries are never removed, so callers only lock items known to exist.
#[derive(Debug, Default)]
pub struct ItemLocks {
    locks: DashMap<ItemRef, Arc<Mutex<()>>>,
}

impl ItemLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Returns the lock handle for `item`.
    ///
    /// The map reference is released before returning, so callers never hold
    /// a shard lock while waiting on the item lock.
    pub fn handle(&self, item: &ItemRef) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(*item)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Number of items with a lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Runs `f` inside the critical section of `item`.
    pub fn with_item<T>(&self, item: &ItemRef, f: impl FnOnce() -> T) -> T {
        let handle = self.handle(item);
        let _guard = handle.lock();
        f()
    }
}
