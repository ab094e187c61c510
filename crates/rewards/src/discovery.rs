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

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::error::ClaimError;

/// Read access to the gauge's staking state.
#[async_trait]
pub trait StakingReader: Send + Sync {
    /// Token ids currently staked by `depositor`.
    async fn staked_token_ids(&self, depositor: Address) -> anyhow::Result<Vec<U256>>;

    /// Reward accrued by `account` on the position `token_id`.
    async fn earned(&self, account: Address, token_id: U256) -> anyhow::Result<U256>;
}

#[async_trait]
impl<T: StakingReader + ?Sized> StakingReader for Arc<T> {
    async fn staked_token_ids(&self, depositor: Address) -> anyhow::Result<Vec<U256>> {
        (**self).staked_token_ids(depositor).await
    }

    async fn earned(&self, account: Address, token_id: U256) -> anyhow::Result<U256> {
        (**self).earned(account, token_id).await
    }
}

/// List the positions `depositor` currently has staked.
///
/// Having nothing staked is not an error and yields an empty list.
pub async fn discover_positions<R: StakingReader + ?Sized>(
    reader: &R,
    depositor: Address,
) -> Result<Vec<U256>, ClaimError> {
    let token_ids = reader
        .staked_token_ids(depositor)
        .await
        .map_err(|source| ClaimError::DiscoveryFailed { depositor, source })?;
    tracing::debug!(%depositor, count = token_ids.len(), "Discovered staked positions");
    Ok(token_ids)
}
