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

//! Acceptance and rejection of offers by the item owner.

use crate::OfferError;
use crate::base::{Identity, OfferId};
use crate::config::ReplacementPolicy;
use crate::guard;
use crate::item::{Item, ItemStatus, ItemStore};
use crate::offer::{Offer, OfferLedger, OfferStatus};
use crate::resolver;
use serde::{Deserialize, Serialize};

/// Owner's verdict on a pending offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Rejected,
}

impl Decision {
    pub fn status(self) -> OfferStatus {
        match self {
            Decision::Accepted => OfferStatus::Accepted,
            Decision::Rejected => OfferStatus::Rejected,
        }
    }
}

/// Outcome of a resolution: the decided offer, the item after side effects,
/// and any offers displaced by it.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub offer: Offer,
    pub item: Item,
    /// Item status before the resolution, used to report status changes.
    pub previous_status: ItemStatus,
    pub displaced: Vec<Offer>,
}

/// Applies `decision` to a pending offer.
///
/// Must run inside the critical section of the offer's item.
///
/// # Errors
///
/// - [`OfferError::OfferNotFound`] / [`OfferError::ItemNotFound`] - Unknown offer or item.
/// - [`OfferError::Forbidden`] - `actor` does not own the item.
/// - [`OfferError::InvalidTransition`] - Offer is not pending.
/// - [`OfferError::ItemClosed`] - Accepting on a completed or cancelled item.
pub fn resolve(
    items: &ItemStore,
    ledger: &OfferLedger,
    policy: ReplacementPolicy,
    actor: &Identity,
    offer_id: OfferId,
    decision: Decision,
) -> Result<Resolution, OfferError> {
    let offer = ledger.get(offer_id).ok_or(OfferError::OfferNotFound)?;
    let item = items.get(&offer.item).ok_or(OfferError::ItemNotFound)?;

    if !guard::owns_item(actor, &item) {
        return Err(OfferError::Forbidden);
    }
    if offer.status != OfferStatus::Pending {
        return Err(OfferError::InvalidTransition);
    }
    let previous_status = item.status();
    if decision == Decision::Accepted && previous_status.is_terminal() {
        return Err(OfferError::ItemClosed);
    }

    let offer = ledger.transition(offer_id, OfferStatus::Pending, decision.status(), None)?;
    if decision == Decision::Rejected {
        return Ok(Resolution {
            offer,
            item,
            previous_status,
            displaced: Vec::new(),
        });
    }

    let item_ref = item.item_ref();
    let (item, displaced) = match item {
        Item::Job(_) => {
            let item = items.add_accepted_provider(&item_ref, offer.provider_id)?;
            let item = if item.status() == ItemStatus::Open {
                items.set_status(&item_ref, ItemStatus::InProgress)?
            } else {
                item
            };
            (item, Vec::new())
        }
        Item::Product(_) => {
            let displaced = resolver::displace_accepted(ledger, &offer, policy)?;
            let item = items.set_status(&item_ref, ItemStatus::InProgress)?;
            (item, displaced)
        }
    };

    Ok(Resolution {
        offer,
        item,
        previous_status,
        displaced,
    })
}
