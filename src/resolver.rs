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

//! Replacement of previously accepted product offers.

use crate::OfferError;
use crate::config::ReplacementPolicy;
use crate::offer::{Offer, OfferLedger, OfferStatus};

/// Rejects the accepted offers that `winner` displaces under `policy`.
///
/// Each displaced offer gets `replaced_by = winner.id`. Returns the displaced
/// offers in id order. Must run inside the item's critical section.
pub fn displace_accepted(
    ledger: &OfferLedger,
    winner: &Offer,
    policy: ReplacementPolicy,
) -> Result<Vec<Offer>, OfferError> {
    let rivals = ledger
        .list_by_item(&winner.item)
        .into_iter()
        .filter(|offer| offer.id != winner.id && offer.status == OfferStatus::Accepted)
        .filter(|offer| policy.displaces(offer.amount, winner.amount));

    let mut displaced = Vec::new();
    for rival in rivals {
        let offer = ledger.transition(
            rival.id,
            OfferStatus::Accepted,
            OfferStatus::Rejected,
            Some(winner.id),
        )?;
        displaced.push(offer);
    }
    Ok(displaced)
}
