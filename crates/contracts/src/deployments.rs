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

use std::borrow::Cow;

use alloy::primitives::{address, Address};
use clap::Args;
use derive_builder::Builder;

pub use alloy_chains::NamedChain;

/// Canonical MultiSendCallOnly (Safe v1.3.0) address, deployed at the same address on every
/// supported chain.
pub const MULTI_SEND_CALL_ONLY: Address = address!("0x40A2aCCbd92BCA938b02010E17A5b8929b49130D");

/// Configuration for a deployment of the gauge and its position manager.
// NOTE: See https://github.com/clap-rs/clap/issues/5092#issuecomment-1703980717 about clap usage.
#[non_exhaustive]
#[derive(Clone, Debug, Builder, Args)]
#[group(requires = "gauge_address", requires = "position_manager_address")]
pub struct Deployment {
    /// EIP-155 chain ID of the network.
    #[clap(long, env)]
    #[builder(setter(into, strip_option), default)]
    pub chain_id: Option<u64>,

    /// Address of the [ICLGauge] contract that holds staked positions and pays rewards.
    ///
    /// [ICLGauge]: crate::contracts::ICLGauge
    #[clap(long, env, required = false, long_help = "Address of the gauge (reward) contract")]
    #[builder(setter(into))]
    pub gauge_address: Address,

    /// Address of the [INonfungiblePositionManager] contract that minted the staked positions.
    ///
    /// [INonfungiblePositionManager]: crate::contracts::INonfungiblePositionManager
    #[clap(
        long,
        env,
        required = false,
        long_help = "Address of the ERC-721 position manager contract"
    )]
    #[builder(setter(into))]
    pub position_manager_address: Address,

    /// Address of the MultiSendCallOnly contract used to batch Safe transactions.
    ///
    /// Defaults to [MULTI_SEND_CALL_ONLY] when not set.
    #[clap(long, env)]
    #[builder(setter(strip_option), default)]
    pub multi_send_address: Option<Address>,

    /// Base URL of the Safe Transaction Service for this chain.
    #[clap(long, env, long_help = "Base URL of the Safe Transaction Service")]
    #[builder(setter(into, strip_option), default)]
    pub safe_tx_service_url: Option<Cow<'static, str>>,
}

impl Deployment {
    /// Create a new [DeploymentBuilder].
    pub fn builder() -> DeploymentBuilder {
        Default::default()
    }

    /// Lookup the [Deployment] for a named chain.
    pub const fn from_chain(chain: NamedChain) -> Option<Deployment> {
        match chain {
            NamedChain::Optimism => Some(OPTIMISM),
            _ => None,
        }
    }

    /// Lookup the [Deployment] by chain ID.
    pub fn from_chain_id(chain_id: impl Into<u64>) -> Option<Deployment> {
        let chain = NamedChain::try_from(chain_id.into()).ok()?;
        Self::from_chain(chain)
    }

    /// Address of the MultiSendCallOnly contract, falling back to the canonical deployment.
    pub fn multi_send_address(&self) -> Address {
        self.multi_send_address.unwrap_or(MULTI_SEND_CALL_ONLY)
    }
}

/// [Deployment] for OP mainnet.
pub const OPTIMISM: Deployment = Deployment {
    chain_id: Some(NamedChain::Optimism as u64),
    gauge_address: address!("0x3914e354979e6bc63782512Bddb24C224E81a1bD"),
    position_manager_address: address!("0xbB5DFE1380333CEE4c2EeBd7202c80dE2256AdF4"),
    multi_send_address: Some(MULTI_SEND_CALL_ONLY),
    safe_tx_service_url: Some(Cow::Borrowed("https://safe-transaction-optimism.safe.global")),
};
