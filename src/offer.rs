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

//! Offer ledger.
//!
//! Offers follow a state machine:
//!
//! ```text
//!  Pending ──accept──► Accepted ──displaced──► Rejected (replaced_by = winner)
//!     │                                            │
//!     └──reject──► Rejected ◄──────────────────────┘
//!                     │
//!                     └──revive──► Pending (replaced_by cleared)
//! ```
//!
//! # Example
//!
//! ```
//! use bid_engine_rs::{ActorId, ItemRef, NewOffer, OfferLedger, OfferStatus};
//!
//! let ledger = OfferLedger::new();
//! let offer = ledger
//!     .create(ActorId(2), NewOffer::new(ItemRef::product(1), 100))
//!     .unwrap();
//! assert_eq!(offer.status, OfferStatus::Pending);
//! ```

use crate::OfferError;
use crate::base::{ActorId, ItemRef, OfferId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
}

impl OfferStatus {
    /// Pending and accepted offers count against the one-per-provider rule.
    pub fn is_active(self) -> bool {
        matches!(self, OfferStatus::Pending | OfferStatus::Accepted)
    }
}

/// A priced proposal by a provider against an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub provider_id: ActorId,
    pub item: ItemRef,
    pub amount: u64,
    pub details: String,
    pub delivery_time: String,
    /// Opaque reference produced by the upload subsystem.
    pub attachment: Option<String>,
    pub status: OfferStatus,
    /// Offer that displaced this one. Only set on rejected offers.
    pub replaced_by: Option<OfferId>,
    pub created_at: DateTime<Utc>,
    /// Incremented on every write.
    pub version: u64,
}

impl Offer {
    fn apply_status(&mut self, status: OfferStatus, replaced_by: Option<OfferId>) {
        self.status = status;
        self.replaced_by = match status {
            OfferStatus::Rejected => replaced_by,
            _ => None,
        };
        self.version += 1;
    }
}

/// Provider-supplied fields of a new offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOffer {
    pub item: ItemRef,
    pub amount: u64,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub delivery_time: String,
    #[serde(default)]
    pub attachment: Option<String>,
}

impl NewOffer {
    pub fn new(item: ItemRef, amount: u64) -> Self {
        Self {
            item,
            amount,
            details: String::new(),
            delivery_time: String::new(),
            attachment: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_delivery_time(mut self, delivery_time: impl Into<String>) -> Self {
        self.delivery_time = delivery_time.into();
        self
    }

    pub fn with_attachment(mut self, attachment: impl Into<String>) -> Self {
        self.attachment = Some(attachment.into());
        self
    }
}

/// New terms for a revived offer. `None` keeps the previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRevision {
    #[serde(default)]
    pub amount: Option<u64>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub delivery_time: Option<String>,
}

impl OfferRevision {
    pub fn amount(amount: u64) -> Self {
        Self {
            amount: Some(amount),
            ..Self::default()
        }
    }
}

/// Thread-safe offer ledger with secondary indexes by item and by provider.
///
/// Each offer is guarded by its own mutex, so writes to one record are
/// linearizable. The `active` index maps `(item, provider)` to the provider's
/// live offer and is updated through the [`DashMap`] entry API, which makes
/// "one active offer per provider per item" a constraint of the ledger itself.
#[derive(Debug)]
pub struct OfferLedger {
    offers: DashMap<OfferId, Arc<Mutex<Offer>>>,
    by_item: DashMap<ItemRef, Vec<OfferId>>,
    by_provider: DashMap<ActorId, Vec<OfferId>>,
    active: DashMap<(ItemRef, ActorId), OfferId>,
    next_id: AtomicU64,
}

impl OfferLedger {
    pub fn new() -> Self {
        Self {
            offers: DashMap::new(),
            by_item: DashMap::new(),
            by_provider: DashMap::new(),
            active: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Stores a new pending offer.
    ///
    /// # Errors
    ///
    /// - [`OfferError::InvalidAmount`] - Amount is zero.
    /// - [`OfferError::DuplicateActiveOffer`] - Provider already has a live offer on the item.
    pub fn create(&self, provider_id: ActorId, new_offer: NewOffer) -> Result<Offer, OfferError> {
        if new_offer.amount == 0 {
            return Err(OfferError::InvalidAmount);
        }

        let item = new_offer.item;

        // Atomic check-and-insert on the active index
        let id = match self.active.entry((item, provider_id)) {
            Entry::Occupied(_) => return Err(OfferError::DuplicateActiveOffer),
            Entry::Vacant(entry) => {
                let id = OfferId(self.next_id.fetch_add(1, Ordering::SeqCst));
                entry.insert(id);
                id
            }
        };

        let offer = Offer {
            id,
            provider_id,
            item,
            amount: new_offer.amount,
            details: new_offer.details,
            delivery_time: new_offer.delivery_time,
            attachment: new_offer.attachment,
            status: OfferStatus::Pending,
            replaced_by: None,
            created_at: Utc::now(),
            version: 0,
        };

        self.offers.insert(id, Arc::new(Mutex::new(offer.clone())));
        self.by_item.entry(item).or_default().push(id);
        self.by_provider.entry(provider_id).or_default().push(id);
        Ok(offer)
    }

    fn record(&self, id: OfferId) -> Result<Arc<Mutex<Offer>>, OfferError> {
        self.offers
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(OfferError::OfferNotFound)
    }

    pub fn get(&self, id: OfferId) -> Option<Offer> {
        self.record(id).ok().map(|record| record.lock().clone())
    }

    fn collect(&self, ids: Vec<OfferId>) -> Vec<Offer> {
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    /// Offers submitted against `item`, in submission order.
    pub fn list_by_item(&self, item: &ItemRef) -> Vec<Offer> {
        let ids = self
            .by_item
            .get(item)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();
        self.collect(ids)
    }

    /// Offers submitted by `provider_id`, in submission order.
    pub fn list_by_provider(&self, provider_id: ActorId) -> Vec<Offer> {
        let ids = self
            .by_provider
            .get(&provider_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();
        self.collect(ids)
    }

    /// Every offer in the ledger, ordered by id.
    pub fn snapshot(&self) -> Vec<Offer> {
        let mut ids: Vec<OfferId> = self.offers.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        self.collect(ids)
    }

    /// Unconditionally writes `status`. `replaced_by` is kept only for rejections.
    pub fn set_status(
        &self,
        id: OfferId,
        status: OfferStatus,
        replaced_by: Option<OfferId>,
    ) -> Result<Offer, OfferError> {
        let record = self.record(id)?;
        let mut offer = record.lock();
        self.reindex(&offer, status)?;
        offer.apply_status(status, replaced_by);
        Ok(offer.clone())
    }

    /// Writes `status` only if the offer is currently in `expected`.
    ///
    /// # Errors
    ///
    /// - [`OfferError::OfferNotFound`] - Unknown offer.
    /// - [`OfferError::InvalidTransition`] - Offer is no longer in `expected`.
    pub fn transition(
        &self,
        id: OfferId,
        expected: OfferStatus,
        status: OfferStatus,
        replaced_by: Option<OfferId>,
    ) -> Result<Offer, OfferError> {
        let record = self.record(id)?;
        let mut offer = record.lock();
        if offer.status != expected {
            return Err(OfferError::InvalidTransition);
        }
        self.reindex(&offer, status)?;
        offer.apply_status(status, replaced_by);
        Ok(offer.clone())
    }

    /// Rewrites a rejected offer into a fresh pending one.
    ///
    /// Id, item and provider are preserved; `replaced_by` is cleared and
    /// `created_at` reset.
    ///
    /// # Errors
    ///
    /// - [`OfferError::OfferNotFound`] - Unknown offer.
    /// - [`OfferError::InvalidAmount`] - Revised amount is zero.
    /// - [`OfferError::DuplicateActiveOffer`] - Provider opened another offer on the item meanwhile.
    pub fn replace(&self, id: OfferId, revision: OfferRevision) -> Result<Offer, OfferError> {
        if revision.amount == Some(0) {
            return Err(OfferError::InvalidAmount);
        }

        let record = self.record(id)?;
        let mut offer = record.lock();
        self.reindex(&offer, OfferStatus::Pending)?;

        if let Some(amount) = revision.amount {
            offer.amount = amount;
        }
        if let Some(details) = revision.details {
            offer.details = details;
        }
        if let Some(delivery_time) = revision.delivery_time {
            offer.delivery_time = delivery_time;
        }
        offer.created_at = Utc::now();
        offer.apply_status(OfferStatus::Pending, None);
        Ok(offer.clone())
    }

    /// Keeps the active index in step with a status change of `offer`.
    ///
    /// Called with the record lock held.
    fn reindex(&self, offer: &Offer, next: OfferStatus) -> Result<(), OfferError> {
        let key = (offer.item, offer.provider_id);
        match (offer.status.is_active(), next.is_active()) {
            (false, true) => match self.active.entry(key) {
                Entry::Occupied(entry) if *entry.get() != offer.id => {
                    Err(OfferError::DuplicateActiveOffer)
                }
                Entry::Occupied(_) => Ok(()),
                Entry::Vacant(entry) => {
                    entry.insert(offer.id);
                    Ok(())
                }
            },
            (true, false) => {
                self.active.remove_if(&key, |_, active_id| *active_id == offer.id);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// The provider's live offer on `item`, if any.
    pub fn active_offer(&self, item: &ItemRef, provider_id: ActorId) -> Option<OfferId> {
        self.active.get(&(*item, provider_id)).map(|id| *id.value())
    }
}

impl Default for OfferLedger {
    fn default() -> Self {
        Self::new()
    }
}
