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

//! Item store.
//!
//! Items follow a small lifecycle owned by the requester:
//!
//! ```text
//!  Open ──first accept──► InProgress ──► Completed
//!    │                        │
//!    └────────────────────────┴────────► Cancelled
//! ```
//!
//! `Completed` and `Cancelled` are terminal.
//!
//! # Example
//!
//! ```
//! use bid_engine_rs::{ActorId, ItemStatus, ItemStore, NewItem};
//!
//! let store = ItemStore::new();
//! let job = store.create_job(ActorId(1), NewItem::titled("Paint the fence"));
//! assert_eq!(job.status(), ItemStatus::Open);
//! ```

use crate::OfferError;
use crate::base::{ActorId, ItemId, ItemKind, ItemRef};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle status shared by both item kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl ItemStatus {
    /// Terminal items admit no further offers or status changes.
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Cancelled)
    }

    /// Whether offers can be submitted or revived against the item.
    pub fn accepts_offers(self) -> bool {
        !self.is_terminal()
    }

    fn check_transition(self, next: ItemStatus) -> Result<(), OfferError> {
        if self == next {
            return Ok(());
        }
        match (self, next) {
            (ItemStatus::Completed | ItemStatus::Cancelled, _) => Err(OfferError::ItemClosed),
            (ItemStatus::Open, _) => Ok(()),
            (ItemStatus::InProgress, ItemStatus::Completed | ItemStatus::Cancelled) => Ok(()),
            (ItemStatus::InProgress, _) => Err(OfferError::InvalidItemTransition),
        }
    }
}

/// Fields common to both item kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemHeader {
    pub id: ItemId,
    pub owner_id: ActorId,
    pub title: String,
    pub description: String,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
}

/// Request for a service. Several providers may be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(flatten)]
    pub header: ItemHeader,
    pub accepted_provider_ids: BTreeSet<ActorId>,
}

/// Request for a product. Resolves to a single winning offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(flatten)]
    pub header: ItemHeader,
}

/// A requester-owned item, either a [`Job`] or a [`Product`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Item {
    Job(Job),
    Product(Product),
}

impl Item {
    pub fn header(&self) -> &ItemHeader {
        match self {
            Item::Job(job) => &job.header,
            Item::Product(product) => &product.header,
        }
    }

    fn header_mut(&mut self) -> &mut ItemHeader {
        match self {
            Item::Job(job) => &mut job.header,
            Item::Product(product) => &mut product.header,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Job(_) => ItemKind::Job,
            Item::Product(_) => ItemKind::Product,
        }
    }

    pub fn item_ref(&self) -> ItemRef {
        ItemRef {
            kind: self.kind(),
            id: self.header().id,
        }
    }

    pub fn owner_id(&self) -> ActorId {
        self.header().owner_id
    }

    pub fn status(&self) -> ItemStatus {
        self.header().status
    }

    /// Accepted providers of a job; `None` for a product.
    pub fn accepted_provider_ids(&self) -> Option<&BTreeSet<ActorId>> {
        match self {
            Item::Job(job) => Some(&job.accepted_provider_ids),
            Item::Product(_) => None,
        }
    }
}

/// Requester-supplied fields of a new item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl NewItem {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
        }
    }
}

/// Thread-safe item store.
///
/// Each record sits behind its own mutex; the map reference is released
/// before the record lock is taken.
#[derive(Debug)]
pub struct ItemStore {
    items: DashMap<ItemRef, Arc<Mutex<Item>>>,
    next_job_id: AtomicU64,
    next_product_id: AtomicU64,
}

impl ItemStore {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
            next_job_id: AtomicU64::new(1),
            next_product_id: AtomicU64::new(1),
        }
    }

    pub fn create_job(&self, owner_id: ActorId, new_item: NewItem) -> Item {
        let id = ItemId(self.next_job_id.fetch_add(1, Ordering::SeqCst));
        let item = Item::Job(Job {
            header: Self::header(id, owner_id, new_item),
            accepted_provider_ids: BTreeSet::new(),
        });
        self.insert(item)
    }

    pub fn create_product(&self, owner_id: ActorId, new_item: NewItem) -> Item {
        let id = ItemId(self.next_product_id.fetch_add(1, Ordering::SeqCst));
        let item = Item::Product(Product {
            header: Self::header(id, owner_id, new_item),
        });
        self.insert(item)
    }

    fn header(id: ItemId, owner_id: ActorId, new_item: NewItem) -> ItemHeader {
        ItemHeader {
            id,
            owner_id,
            title: new_item.title,
            description: new_item.description,
            status: ItemStatus::Open,
            created_at: Utc::now(),
        }
    }

    fn insert(&self, item: Item) -> Item {
        self.items
            .insert(item.item_ref(), Arc::new(Mutex::new(item.clone())));
        item
    }

    fn record(&self, item_ref: &ItemRef) -> Result<Arc<Mutex<Item>>, OfferError> {
        self.items
            .get(item_ref)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(OfferError::ItemNotFound)
    }

    /// Whether `item_ref` names a stored item. Items are never removed.
    pub fn contains(&self, item_ref: &ItemRef) -> bool {
        self.items.contains_key(item_ref)
    }

    /// Returns a snapshot of the item.
    pub fn get(&self, item_ref: &ItemRef) -> Option<Item> {
        self.record(item_ref).ok().map(|record| record.lock().clone())
    }

    /// Returns snapshots of every item, ordered by kind then id.
    pub fn list(&self) -> Vec<Item> {
        let records: Vec<_> = self
            .items
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut items: Vec<Item> = records.iter().map(|r| r.lock().clone()).collect();
        items.sort_by_key(Item::item_ref);
        items
    }

    /// Moves the item to `status`.
    ///
    /// # Errors
    ///
    /// - [`OfferError::ItemNotFound`] - Unknown item.
    /// - [`OfferError::ItemClosed`] - Item is already completed or cancelled.
    /// - [`OfferError::InvalidItemTransition`] - `InProgress` back to `Open`.
    pub fn set_status(&self, item_ref: &ItemRef, status: ItemStatus) -> Result<Item, OfferError> {
        let record = self.record(item_ref)?;
        let mut item = record.lock();
        item.status().check_transition(status)?;
        item.header_mut().status = status;
        Ok(item.clone())
    }

    /// Adds `provider_id` to a job's accepted set. Inserting twice is a no-op.
    ///
    /// # Errors
    ///
    /// - [`OfferError::ItemNotFound`] - Unknown item.
    /// - [`OfferError::InvalidItemTransition`] - The item is a product.
    pub fn add_accepted_provider(
        &self,
        item_ref: &ItemRef,
        provider_id: ActorId,
    ) -> Result<Item, OfferError> {
        let record = self.record(item_ref)?;
        let mut item = record.lock();
        match &mut *item {
            Item::Job(job) => {
                job.accepted_provider_ids.insert(provider_id);
            }
            Item::Product(_) => return Err(OfferError::InvalidItemTransition),
        }
        Ok(item.clone())
    }
}

impl Default for ItemStore {
    fn default() -> Self {
        Self::new()
    }
}
