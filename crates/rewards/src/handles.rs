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

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
};
use anyhow::Context;
use async_trait::async_trait;
use claimer_contracts::{
    contracts::{
        ICLGauge::{self, ICLGaugeInstance},
        INonfungiblePositionManager::{self, INonfungiblePositionManagerInstance},
    },
    Deployment,
};

use crate::{
    discovery::StakingReader,
    metadata::{MetadataSource, TokenUriResolver},
    position::PositionMetadata,
};

/// Typed handles to the gauge and its position manager, sharing one provider.
#[derive(Clone)]
pub struct GaugeHandles<P> {
    gauge: ICLGaugeInstance<P>,
    position_manager: INonfungiblePositionManagerInstance<P>,
    resolver: TokenUriResolver,
}

impl<P: Provider + Clone> GaugeHandles<P> {
    pub fn new(deployment: &Deployment, provider: P) -> Self {
        Self {
            gauge: ICLGauge::new(deployment.gauge_address, provider.clone()),
            position_manager: INonfungiblePositionManager::new(
                deployment.position_manager_address,
                provider,
            ),
            resolver: TokenUriResolver::default(),
        }
    }
}

impl<P: Provider> GaugeHandles<P> {
    /// Use `resolver` to turn token URIs into metadata.
    pub fn with_metadata_resolver(self, resolver: TokenUriResolver) -> Self {
        Self { resolver, ..self }
    }

    pub fn gauge_address(&self) -> Address {
        *self.gauge.address()
    }

    pub fn position_manager_address(&self) -> Address {
        *self.position_manager.address()
    }
}

#[async_trait]
impl<P: Provider> StakingReader for GaugeHandles<P> {
    async fn staked_token_ids(&self, depositor: Address) -> anyhow::Result<Vec<U256>> {
        self.gauge
            .stakedValues(depositor)
            .call()
            .await
            .with_context(|| format!("stakedValues({depositor}) failed"))
    }

    async fn earned(&self, account: Address, token_id: U256) -> anyhow::Result<U256> {
        self.gauge
            .earned(account, token_id)
            .call()
            .await
            .with_context(|| format!("earned({account}, {token_id}) failed"))
    }
}

#[async_trait]
impl<P: Provider> MetadataSource for GaugeHandles<P> {
    async fn position_metadata(&self, token_id: U256) -> anyhow::Result<PositionMetadata> {
        let uri = self
            .position_manager
            .tokenURI(token_id)
            .call()
            .await
            .with_context(|| format!("tokenURI({token_id}) failed"))?;
        let metadata = self
            .resolver
            .resolve(&uri)
            .await
            .with_context(|| format!("failed to resolve metadata of position {token_id}"))?;
        Ok(metadata)
    }
}
