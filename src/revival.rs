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

//! Revival of rejected offers.

use crate::OfferError;
use crate::base::{Identity, OfferId};
use crate::guard;
use crate::item::ItemStore;
use crate::offer::{Offer, OfferLedger, OfferRevision, OfferStatus};

/// Reopens a rejected offer as a fresh pending one with the revised terms.
///
/// Must run inside the critical section of the offer's item.
///
/// # Errors
///
/// - [`OfferError::OfferNotFound`] / [`OfferError::ItemNotFound`] - Unknown offer or item.
/// - [`OfferError::Forbidden`] - `actor` did not submit the offer.
/// - [`OfferError::InvalidTransition`] - Offer is not rejected.
/// - [`OfferError::ItemClosed`] - Item is completed or cancelled.
/// - [`OfferError::DuplicateActiveOffer`] - Provider has another live offer on the item.
pub fn revive(
    items: &ItemStore,
    ledger: &OfferLedger,
    actor: &Identity,
    offer_id: OfferId,
    revision: OfferRevision,
) -> Result<Offer, OfferError> {
    let offer = ledger.get(offer_id).ok_or(OfferError::OfferNotFound)?;
    if !guard::owns_offer(actor, &offer) {
        return Err(OfferError::Forbidden);
    }
    if offer.status != OfferStatus::Rejected {
        return Err(OfferError::InvalidTransition);
    }

    let item = items.get(&offer.item).ok_or(OfferError::ItemNotFound)?;
    if !item.status().accepts_offers() {
        return Err(OfferError::ItemClosed);
    }

    ledger.replace(offer_id, revision)
}
