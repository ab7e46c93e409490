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

//! Authorization predicates.
//!
//! Stateless checks run before any mutation.

use crate::base::{Identity, Role};
use crate::item::Item;
use crate::offer::Offer;

/// The identity is the requester who owns `item`.
pub fn owns_item(identity: &Identity, item: &Item) -> bool {
    identity.role == Role::Requester && identity.id == item.owner_id()
}

/// The identity is the provider who submitted `offer`.
pub fn owns_offer(identity: &Identity, offer: &Offer) -> bool {
    identity.role == Role::Provider && identity.id == offer.provider_id
}

pub fn is_provider(identity: &Identity) -> bool {
    identity.role == Role::Provider
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{ActorId, ItemRef};
    use crate::item::{ItemStore, NewItem};
    use crate::offer::{NewOffer, OfferLedger};

    #[test]
    fn owner_requester_owns_item() {
        let store = ItemStore::new();
        let item = store.create_job(ActorId(1), NewItem::titled("job"));
        assert!(owns_item(&Identity::requester(1), &item));
        assert!(!owns_item(&Identity::requester(2), &item));
        // Same id acting as a provider is not the owner
        assert!(!owns_item(&Identity::provider(1), &item));
    }

    #[test]
    fn submitting_provider_owns_offer() {
        let ledger = OfferLedger::new();
        let offer = ledger
            .create(ActorId(5), NewOffer::new(ItemRef::job(1), 10))
            .unwrap();
        assert!(owns_offer(&Identity::provider(5), &offer));
        assert!(!owns_offer(&Identity::provider(6), &offer));
        assert!(!owns_offer(&Identity::requester(5), &offer));
    }

    #[test]
    fn provider_role() {
        assert!(is_provider(&Identity::provider(1)));
        assert!(!is_provider(&Identity::requester(1)));
    }
}
