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

//! Core identifier types for actors, items, and offers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an actor (requester or provider account).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an item within its kind.
///
/// Jobs and products are numbered independently, so an `ItemId` is only
/// meaningful together with an [`ItemKind`]. See [`ItemRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique identifier for an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct OfferId(pub u64);

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two kinds of item an offer can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Request for a service. Several providers may be accepted.
    Job,
    /// Request for a product. Resolves to a single winning offer.
    Product,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Job => f.write_str("job"),
            ItemKind::Product => f.write_str("product"),
        }
    }
}

/// Fully qualified item key: kind plus per-kind id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub id: ItemId,
}

impl ItemRef {
    pub fn job(id: u64) -> Self {
        Self {
            kind: ItemKind::Job,
            id: ItemId(id),
        }
    }

    pub fn product(id: u64) -> Self {
        Self {
            kind: ItemKind::Product,
            id: ItemId(id),
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Role an actor authenticated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Requester,
    Provider,
}

/// Authenticated caller, supplied by the authentication boundary on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Identity {
    pub id: ActorId,
    pub role: Role,
}

impl Identity {
    pub fn requester(id: u64) -> Self {
        Self {
            id: ActorId(id),
            role: Role::Requester,
        }
    }

    pub fn provider(id: u64) -> Self {
        Self {
            id: ActorId(id),
            role: Role::Provider,
        }
    }
}
