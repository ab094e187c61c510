// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// A position staked in the gauge, with the reward it has accrued at read time.
///
/// Positions are rebuilt from chain reads on every discovery pass and never cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StakedPosition {
    /// Token id of the position NFT, held by the gauge while staked.
    pub token_id: U256,
    /// Claimable reward in the reward token's smallest unit.
    pub earned_rewards: U256,
    /// Descriptive metadata of the position NFT.
    pub metadata: PositionMetadata,
}

impl StakedPosition {
    /// Name from the metadata, or `#<token id>` when the metadata has none.
    pub fn display_name(&self) -> String {
        match &self.metadata.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("#{}", self.token_id),
        }
    }
}

/// ERC-721 metadata document of a position.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub attributes: Vec<MetadataAttribute>,
    /// URI the document was resolved from.
    #[serde(skip)]
    pub token_uri: String,
}

/// One entry of the `attributes` array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataAttribute {
    #[serde(default)]
    pub trait_type: Option<String>,
    pub value: serde_json::Value,
}

/// Sum of the claimable rewards across positions.
pub fn total_earned(positions: &[StakedPosition]) -> U256 {
    positions.iter().map(|position| position.earned_rewards).sum()
}
