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

//! Offer lifecycle engine.
//!
//! The [`Engine`] is the boundary of the crate. It owns the [`ItemStore`], the
//! [`OfferLedger`] and the per-item locks, and exposes the operations a
//! request-handling layer calls.
//!
//! # Operations
//!
//! - **Submit**: A provider places a pending offer on an open or in-progress item.
//! - **Resolve**: The item owner accepts or rejects a pending offer. Accepting
//!   on a product displaces previously accepted offers; accepting on a job adds
//!   the provider to the accepted set.
//! - **Revive**: A provider reopens a rejected offer with new terms.
//! - **Complete / Cancel**: The owner closes the item.
//!
//! # Thread Safety
//!
//! Every mutating operation runs inside the critical section of the item it
//! touches (see [`ItemLocks`]). Operations on different items proceed in
//! parallel. Events are pushed before the item lock is released, so the
//! feed orders the changes of one item the way they happened.

use crate::acceptance::{self, Decision, Resolution};
use crate::OfferError;
use crate::base::{ActorId, Identity, ItemRef, OfferId};
use crate::config::EngineConfig;
use crate::event::{EventQueue, OfferEvent, SequencedEvent};
use crate::guard;
use crate::item::{Item, ItemStatus, ItemStore, NewItem};
use crate::item_lock::ItemLocks;
use crate::offer::{NewOffer, Offer, OfferLedger, OfferRevision, OfferStatus};
use crate::revival;
use tracing::{debug, info};

/// Offer lifecycle engine.
///
/// # Invariants
///
/// - A provider holds at most one pending or accepted offer per item.
/// - Under [`ReplacementPolicy::SingleWinner`](crate::ReplacementPolicy) a
///   product has at most one accepted offer.
/// - A rejected offer with `replaced_by` points at an offer of the same item
///   that was accepted when the replacement happened.
/// - Only pending offers can be accepted or rejected; only rejected offers
///   can be revived.
pub struct Engine {
    items: ItemStore,
    offers: OfferLedger,
    locks: ItemLocks,
    events: EventQueue,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine {
            items: ItemStore::new(),
            offers: OfferLedger::new(),
            locks: ItemLocks::new(),
            events: EventQueue::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Posts a new job owned by `owner`.
    pub fn create_job(&self, owner: ActorId, new_item: NewItem) -> Item {
        let item = self.items.create_job(owner, new_item);
        debug!(item = %item.item_ref(), owner = %owner, "job created");
        item
    }

    /// Posts a new product request owned by `owner`.
    pub fn create_product(&self, owner: ActorId, new_item: NewItem) -> Item {
        let item = self.items.create_product(owner, new_item);
        debug!(item = %item.item_ref(), owner = %owner, "product created");
        item
    }

    /// Places a pending offer on an item.
    ///
    /// # Errors
    ///
    /// - [`OfferError::Forbidden`] - `provider` is not acting as a provider.
    /// - [`OfferError::ItemNotFound`] - Unknown item.
    /// - [`OfferError::ItemClosed`] - Item is completed or cancelled.
    /// - [`OfferError::InvalidAmount`] - Amount is zero.
    /// - [`OfferError::DuplicateActiveOffer`] - Provider already has a live offer on the item.
    pub fn submit_offer(
        &self,
        provider: &Identity,
        new_offer: NewOffer,
    ) -> Result<Offer, OfferError> {
        if !guard::is_provider(provider) {
            return Err(OfferError::Forbidden);
        }
        let item_ref = new_offer.item;

        self.with_existing_item(&item_ref, || {
            let item = self.items.get(&item_ref).ok_or(OfferError::ItemNotFound)?;
            if !item.status().accepts_offers() {
                return Err(OfferError::ItemClosed);
            }
            let offer = self.offers.create(provider.id, new_offer)?;

            debug!(
                offer = %offer.id,
                item = %item_ref,
                provider = %offer.provider_id,
                amount = offer.amount,
                "offer submitted"
            );
            self.events.push(OfferEvent::Submitted {
                offer: offer.id,
                item: item_ref,
                provider: offer.provider_id,
                amount: offer.amount,
            });
            Ok(offer)
        })
    }

    /// Accepts or rejects a pending offer on behalf of the item owner.
    ///
    /// # Errors
    ///
    /// - [`OfferError::OfferNotFound`] / [`OfferError::ItemNotFound`] - Unknown offer or item.
    /// - [`OfferError::Forbidden`] - `actor` does not own the item.
    /// - [`OfferError::InvalidTransition`] - Offer is not pending.
    /// - [`OfferError::ItemClosed`] - Accepting on a completed or cancelled item.
    pub fn resolve_offer(
        &self,
        actor: &Identity,
        offer_id: OfferId,
        decision: Decision,
    ) -> Result<Offer, OfferError> {
        // The item of an offer never changes, so it is safe to read it before locking
        let item_ref = self.item_of(offer_id)?;

        let resolution = self.locks.with_item(&item_ref, || {
            let resolution = acceptance::resolve(
                &self.items,
                &self.offers,
                self.config.replacement_policy,
                actor,
                offer_id,
                decision,
            )?;
            self.record_resolution(&resolution);
            Ok(resolution)
        })?;

        Ok(resolution.offer)
    }

    /// Pushes the events of a resolution. Called inside the item's critical
    /// section so sequence numbers follow the order of the changes.
    fn record_resolution(&self, resolution: &Resolution) {
        let offer = &resolution.offer;
        debug!(offer = %offer.id, item = %offer.item, status = ?offer.status, "offer resolved");
        self.events.push(match offer.status {
            OfferStatus::Accepted => OfferEvent::Accepted {
                offer: offer.id,
                item: offer.item,
                provider: offer.provider_id,
            },
            _ => OfferEvent::Rejected {
                offer: offer.id,
                item: offer.item,
                provider: offer.provider_id,
            },
        });

        for displaced in &resolution.displaced {
            info!(
                offer = %displaced.id,
                item = %displaced.item,
                provider = %displaced.provider_id,
                replaced_by = %offer.id,
                "accepted offer displaced"
            );
            self.events.push(OfferEvent::Displaced {
                offer: displaced.id,
                item: displaced.item,
                provider: displaced.provider_id,
                replaced_by: offer.id,
            });
        }

        let status = resolution.item.status();
        if status != resolution.previous_status {
            self.record_item_status(resolution.item.item_ref(), status);
        }
    }

    /// Reopens a rejected offer as a pending one with revised terms.
    ///
    /// # Errors
    ///
    /// - [`OfferError::OfferNotFound`] / [`OfferError::ItemNotFound`] - Unknown offer or item.
    /// - [`OfferError::Forbidden`] - `actor` did not submit the offer.
    /// - [`OfferError::InvalidTransition`] - Offer is not rejected.
    /// - [`OfferError::ItemClosed`] - Item is completed or cancelled.
    /// - [`OfferError::InvalidAmount`] - Revised amount is zero.
    /// - [`OfferError::DuplicateActiveOffer`] - Provider has another live offer on the item.
    pub fn revive_offer(
        &self,
        actor: &Identity,
        offer_id: OfferId,
        revision: OfferRevision,
    ) -> Result<Offer, OfferError> {
        let item_ref = self.item_of(offer_id)?;

        self.locks.with_item(&item_ref, || {
            let offer = revival::revive(&self.items, &self.offers, actor, offer_id, revision)?;

            debug!(offer = %offer.id, item = %offer.item, amount = offer.amount, "offer revived");
            self.events.push(OfferEvent::Revived {
                offer: offer.id,
                item: offer.item,
                provider: offer.provider_id,
                amount: offer.amount,
            });
            Ok(offer)
        })
    }

    /// Marks the item completed. Owner only.
    pub fn complete_item(&self, actor: &Identity, item_ref: &ItemRef) -> Result<Item, OfferError> {
        self.close_item(actor, item_ref, ItemStatus::Completed)
    }

    /// Marks the item cancelled. Owner only.
    pub fn cancel_item(&self, actor: &Identity, item_ref: &ItemRef) -> Result<Item, OfferError> {
        self.close_item(actor, item_ref, ItemStatus::Cancelled)
    }

    fn close_item(
        &self,
        actor: &Identity,
        item_ref: &ItemRef,
        status: ItemStatus,
    ) -> Result<Item, OfferError> {
        self.with_existing_item(item_ref, || {
            let item = self.items.get(item_ref).ok_or(OfferError::ItemNotFound)?;
            if !guard::owns_item(actor, &item) {
                return Err(OfferError::Forbidden);
            }
            let closed = self.items.set_status(item_ref, status)?;
            if item.status() != status {
                self.record_item_status(*item_ref, status);
            }
            Ok(closed)
        })
    }

    /// Runs `f` in the critical section of an item that is known to exist.
    ///
    /// Unknown items fail before a lock entry is created for them.
    fn with_existing_item<T>(
        &self,
        item_ref: &ItemRef,
        f: impl FnOnce() -> Result<T, OfferError>,
    ) -> Result<T, OfferError> {
        if !self.items.contains(item_ref) {
            return Err(OfferError::ItemNotFound);
        }
        self.locks.with_item(item_ref, f)
    }

    fn record_item_status(&self, item: ItemRef, status: ItemStatus) {
        info!(item = %item, status = ?status, "item status changed");
        self.events.push(OfferEvent::ItemStatusChanged { item, status });
    }

    fn item_of(&self, offer_id: OfferId) -> Result<ItemRef, OfferError> {
        self.offers
            .get(offer_id)
            .map(|offer| offer.item)
            .ok_or(OfferError::OfferNotFound)
    }

    pub fn get_offer(&self, offer_id: OfferId) -> Option<Offer> {
        self.offers.get(offer_id)
    }

    pub fn get_item(&self, item_ref: &ItemRef) -> Option<Item> {
        self.items.get(item_ref)
    }

    /// Offers submitted against an item, in submission order.
    pub fn list_offers_for_item(&self, item_ref: &ItemRef) -> Vec<Offer> {
        self.offers.list_by_item(item_ref)
    }

    /// Offers submitted by a provider, in submission order.
    pub fn list_offers_for_provider(&self, provider_id: ActorId) -> Vec<Offer> {
        self.offers.list_by_provider(provider_id)
    }

    /// Every offer, ordered by id.
    pub fn offers(&self) -> Vec<Offer> {
        self.offers.snapshot()
    }

    /// Every item, ordered by kind then id.
    pub fn items(&self) -> Vec<Item> {
        self.items.list()
    }

    /// Removes and returns the recorded state changes.
    pub fn drain_events(&self) -> Vec<SequencedEvent> {
        self.events.drain()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
