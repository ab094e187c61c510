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

//! Common configuration options for commands in the claimer CLI.

use std::{num::ParseIntError, time::Duration};

use alloy::{
    primitives::Address,
    providers::Provider,
    signers::local::PrivateKeySigner,
};
use anyhow::{bail, Context, Result};
use claimer_contracts::Deployment;
use claimer_rewards::{ClaimError, TokenUriResolver, DEFAULT_IPFS_GATEWAY};
use clap::Args;
use tracing::level_filters::LevelFilter;
use url::Url;

/// Common configuration options for all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalConfig {
    /// URL of the Ethereum RPC endpoint
    #[clap(short, long, env = "RPC_URL", global = true)]
    pub rpc_url: Option<Url>,

    /// Private key of the wallet (without 0x prefix)
    #[clap(long, env = "PRIVATE_KEY", global = true, hide_env_values = true)]
    pub private_key: Option<PrivateKeySigner>,

    /// Ethereum transaction timeout in seconds.
    #[clap(long, env = "TX_TIMEOUT", global = true, value_parser = |arg: &str| -> Result<Duration, ParseIntError> {Ok(Duration::from_secs(arg.parse()?))})]
    pub tx_timeout: Option<Duration>,

    /// HTTP gateway used to fetch `ipfs://` position metadata.
    #[clap(long, env = "IPFS_GATEWAY", global = true, default_value = DEFAULT_IPFS_GATEWAY)]
    pub ipfs_gateway: Url,

    /// Log level (error, warn, info, debug, trace)
    #[clap(long, env = "LOG_LEVEL", global = true, default_value = "info")]
    pub log_level: LevelFilter,

    /// Whether to log in JSON format.
    #[clap(long, env = "LOG_JSON", global = true, default_value_t = false)]
    pub log_json: bool,
}

impl GlobalConfig {
    /// Access [Self::rpc_url] or return an error that can be shown to the user.
    pub fn require_rpc_url(&self) -> Result<Url> {
        self.rpc_url
            .clone()
            .context("Blockchain RPC URL not provided; please set --rpc-url or the RPC_URL env var")
    }

    /// Access [Self::private_key] or return [ClaimError::NoSigner].
    pub fn require_private_key(&self) -> Result<PrivateKeySigner> {
        self.private_key
            .clone()
            .ok_or(ClaimError::NoSigner)
            .context("please set --private-key or the PRIVATE_KEY env var")
    }

    /// Resolver for position metadata using the configured IPFS gateway.
    pub fn metadata_resolver(&self) -> TokenUriResolver {
        TokenUriResolver::new(self.ipfs_gateway.clone())
    }
}

/// Which positions a command operates on.
#[derive(Args, Debug, Clone)]
pub struct TargetConfig {
    /// Address whose staked positions to use.
    ///
    /// Defaults to the Safe when --safe-address is set, and to the signer otherwise.
    pub depositor: Option<Address>,

    /// Address of a Safe owned by the signer. Claims are proposed to the Safe instead of sent.
    #[clap(long, env = "SAFE_ADDRESS")]
    pub safe_address: Option<Address>,

    /// Configuration for the gauge deployment to use.
    #[clap(flatten, next_help_heading = "Gauge Deployment")]
    pub deployment: Option<Deployment>,
}

impl TargetConfig {
    /// The depositor to query: explicit, then the Safe, then the signer.
    pub fn depositor(&self, signer: Option<Address>) -> Result<Address> {
        self.depositor.or(self.safe_address).or(signer).context(
            "no depositor address; pass one as an argument, or set --safe-address or --private-key",
        )
    }

    /// The depositor a claim sent by `signer` acts for.
    ///
    /// The gauge only lets the account that staked a position claim and withdraw it, so this is
    /// the Safe when --safe-address is set and the signer otherwise. An explicit depositor must
    /// be that account.
    pub fn claim_depositor(&self, signer: Address) -> Result<Address> {
        let account = self.safe_address.unwrap_or(signer);
        match self.depositor {
            Some(depositor) if depositor != account => bail!(
                "cannot claim for {depositor}: staked positions can only be claimed and withdrawn by the account that staked them, and claims would be sent from {account}"
            ),
            _ => Ok(account),
        }
    }

    /// The configured deployment, or the built-in one for the provider's chain.
    pub async fn deployment(&self, provider: &impl Provider) -> Result<Deployment> {
        if let Some(deployment) = &self.deployment {
            return Ok(deployment.clone());
        }
        let chain_id = provider.get_chain_id().await.context("failed to query chain ID")?;
        Deployment::from_chain_id(chain_id).with_context(|| {
            format!("no built-in gauge deployment for chain {chain_id}; please specify deployment explicitly")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(depositor: Option<Address>, safe_address: Option<Address>) -> TargetConfig {
        TargetConfig { depositor, safe_address, deployment: None }
    }

    #[test]
    fn depositor_precedence() {
        let explicit = Address::repeat_byte(1);
        let safe = Address::repeat_byte(2);
        let signer = Address::repeat_byte(3);

        assert_eq!(target(Some(explicit), Some(safe)).depositor(Some(signer)).unwrap(), explicit);
        assert_eq!(target(None, Some(safe)).depositor(Some(signer)).unwrap(), safe);
        assert_eq!(target(None, None).depositor(Some(signer)).unwrap(), signer);
        assert!(target(None, None).depositor(None).is_err());
    }

    #[test]
    fn claim_depositor_is_the_sending_account() {
        let safe = Address::repeat_byte(2);
        let signer = Address::repeat_byte(3);
        let other = Address::repeat_byte(4);

        assert_eq!(target(None, None).claim_depositor(signer).unwrap(), signer);
        assert_eq!(target(Some(signer), None).claim_depositor(signer).unwrap(), signer);
        assert_eq!(target(None, Some(safe)).claim_depositor(signer).unwrap(), safe);
        assert_eq!(target(Some(safe), Some(safe)).claim_depositor(signer).unwrap(), safe);

        let err = target(Some(other), None).claim_depositor(signer).unwrap_err();
        assert!(err.to_string().contains(&other.to_string()), "unexpected error: {err}");
        // With a Safe, claims come from the Safe, not the signer.
        assert!(target(Some(signer), Some(safe)).claim_depositor(signer).is_err());
        assert!(target(Some(other), Some(safe)).claim_depositor(signer).is_err());
    }
}
