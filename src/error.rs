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

//! Error types for offer processing.
//!
//! Every variant is a deterministic rejection of the request. None of them is
//! retried inside the engine.

use thiserror::Error;

/// Offer and item processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OfferError {
    /// Referenced item does not exist
    #[error("item not found")]
    ItemNotFound,

    /// Referenced offer does not exist
    #[error("offer not found")]
    OfferNotFound,

    /// Acting identity is not allowed to touch this item or offer
    #[error("operation not permitted for this identity")]
    Forbidden,

    /// Offer is not in the status the operation requires
    #[error("offer is not in a state that allows this operation")]
    InvalidTransition,

    /// Item is completed or cancelled
    #[error("item is no longer accepting offers")]
    ItemClosed,

    /// Provider already holds a pending or accepted offer on the item
    #[error("provider already has an active offer on this item")]
    DuplicateActiveOffer,

    /// Amount is zero
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Requested item status change is not allowed
    #[error("invalid item status transition")]
    InvalidItemTransition,
}

impl OfferError {
    /// Returns `true` for both not-found variants.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OfferError::ItemNotFound | OfferError::OfferNotFound)
    }
}
