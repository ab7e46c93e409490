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

//! # Bid Engine
//!
//! This library resolves which offer wins a requester's item. Providers submit
//! priced offers against jobs (service requests) and products (goods
//! requests); the requester accepts or rejects them, accepted product offers
//! displace earlier winners, and rejected offers can be revived with new terms.
//!
//! ## Core Components
//!
//! - [`Engine`]: Boundary facade running every operation in its item's critical section
//! - [`ItemStore`]: Jobs and products with their lifecycle status
//! - [`OfferLedger`]: Offer records with lookup by item and by provider
//! - [`OfferError`]: Error types for rejected requests
//!
//! ## Example
//!
//! ```
//! use bid_engine_rs::{Decision, Engine, Identity, NewItem, NewOffer, OfferStatus};
//!
//! let engine = Engine::new();
//! let owner = Identity::requester(1);
//! let item = engine.create_product(owner.id, NewItem::titled("Used bike"));
//!
//! let high = engine
//!     .submit_offer(&Identity::provider(2), NewOffer::new(item.item_ref(), 100))
//!     .unwrap();
//! let low = engine
//!     .submit_offer(&Identity::provider(3), NewOffer::new(item.item_ref(), 80))
//!     .unwrap();
//!
//! engine.resolve_offer(&owner, high.id, Decision::Accepted).unwrap();
//! engine.resolve_offer(&owner, low.id, Decision::Accepted).unwrap();
//!
//! // The earlier winner is displaced and points at its successor
//! let high = engine.get_offer(high.id).unwrap();
//! assert_eq!(high.status, OfferStatus::Rejected);
//! assert_eq!(high.replaced_by, Some(low.id));
//! ```
//!
//! ## Thread Safety
//!
//! Stores are built on [`dashmap`] with a `parking_lot` mutex per record, and
//! every mutating operation holds a per-item lock, so requests on different
//! items run in parallel while racing requests on one item serialize.

pub mod acceptance;
mod base;
pub mod config;
mod engine;
pub mod error;
pub mod event;
pub mod guard;
pub mod item;
mod item_lock;
pub mod offer;
pub mod resolver;
pub mod revival;

pub use acceptance::Decision;
pub use base::{ActorId, Identity, ItemId, ItemKind, ItemRef, OfferId, Role};
pub use config::{EngineConfig, ReplacementPolicy};
pub use engine::Engine;
pub use error::OfferError;
pub use event::{EventQueue, OfferEvent, SequencedEvent};
pub use item::{Item, ItemStatus, ItemStore, NewItem};
pub use item_lock::ItemLocks;
pub use offer::{NewOffer, Offer, OfferLedger, OfferRevision, OfferStatus};
