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

//! Ordered feed of offer and item state changes.
//!
//! The engine never notifies anyone itself. It records what happened here and
//! the boundary (chat, e-mail, push) drains the feed, so a displaced provider
//! learns about the offer that replaced theirs.

use crate::base::{ActorId, ItemRef, OfferId};
use crate::item::ItemStatus;
use crossbeam::queue::SegQueue;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OfferEvent {
    Submitted {
        offer: OfferId,
        item: ItemRef,
        provider: ActorId,
        amount: u64,
    },
    Accepted {
        offer: OfferId,
        item: ItemRef,
        provider: ActorId,
    },
    Rejected {
        offer: OfferId,
        item: ItemRef,
        provider: ActorId,
    },
    /// An accepted offer lost to a later acceptance on the same product.
    Displaced {
        offer: OfferId,
        item: ItemRef,
        provider: ActorId,
        replaced_by: OfferId,
    },
    Revived {
        offer: OfferId,
        item: ItemRef,
        provider: ActorId,
        amount: u64,
    },
    ItemStatusChanged {
        item: ItemRef,
        status: ItemStatus,
    },
}

/// An event with its position in the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequencedEvent {
    pub seq: u64,
    #[serde(flatten)]
    pub event: OfferEvent,
}

/// Lock-free multi-producer event queue.
#[derive(Debug)]
pub struct EventQueue {
    events: SegQueue<SequencedEvent>,
    next_seq: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            events: SegQueue::new(),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Appends an event and returns its sequence number.
    pub fn push(&self, event: OfferEvent) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.events.push(SequencedEvent { seq, event });
        seq
    }

    /// Removes and returns every queued event, ordered by sequence number.
    pub fn drain(&self) -> Vec<SequencedEvent> {
        let mut drained = Vec::with_capacity(self.events.len());
        while let Some(event) = self.events.pop() {
            drained.push(event);
        }
        // Concurrent producers may enqueue slightly out of sequence order
        drained.sort_by_key(|e| e.seq);
        drained
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
