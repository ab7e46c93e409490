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

//! Engine configuration.

use serde::Deserialize;

/// How accepting an offer on a product treats offers that were already accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReplacementPolicy {
    /// Every other accepted offer is displaced by the new one.
    #[default]
    SingleWinner,
    /// Only accepted offers with a strictly higher amount are displaced.
    DisplaceWorse,
}

impl ReplacementPolicy {
    /// Whether an accepted offer at `incumbent` gives way to a newly accepted
    /// offer at `challenger`.
    pub fn displaces(self, incumbent: u64, challenger: u64) -> bool {
        match self {
            ReplacementPolicy::SingleWinner => true,
            ReplacementPolicy::DisplaceWorse => incumbent > challenger,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub replacement_policy: ReplacementPolicy,
}
