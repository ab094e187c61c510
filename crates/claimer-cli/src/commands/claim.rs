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

use alloy::{
    primitives::utils::format_ether,
    providers::{Provider, ProviderBuilder},
};
use anyhow::Context;
use claimer_contracts::Deployment;
use claimer_rewards::{
    detect_capability, total_earned, ClaimWorkflow, GaugeHandles, SafeProposer,
    SafeTransactionService, SubmissionResult, Submitter, SubmitterCapability, WalletSender,
};
use clap::Args;
use url::Url;

use crate::config::{GlobalConfig, TargetConfig};

/// Command to claim the rewards of every staked position and withdraw the positions.
#[non_exhaustive]
#[derive(Args, Clone, Debug)]
pub struct Claim {
    /// Depositor, Safe and deployment to use.
    #[clap(flatten)]
    pub target: TargetConfig,

    /// Send one transaction per intent even if the wallet supports atomic batches.
    #[clap(long, conflicts_with = "safe_address")]
    pub sequential: bool,
}

impl Claim {
    /// Run the [Claim] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        let signer = global_config.require_private_key()?;
        let rpc_url = global_config.require_rpc_url()?;
        let depositor = self.target.claim_depositor(signer.address())?;

        // Connect to the chain.
        let provider = ProviderBuilder::new()
            .wallet(signer.clone())
            .connect(rpc_url.as_str())
            .await
            .with_context(|| format!("failed to connect provider to {rpc_url}"))?;
        let chain_id = provider.get_chain_id().await?;
        let deployment = self.target.deployment(&provider).await?;

        let wallet = WalletSender::new(provider.clone(), signer.address(), chain_id)
            .with_gauge(deployment.gauge_address)
            .with_timeout(global_config.tx_timeout);
        let proposer = match self.target.safe_address {
            Some(safe) => Some(SafeProposer::new(
                safe,
                provider.clone(),
                signer.clone(),
                deployment.multi_send_address(),
                safe_service(&deployment)?,
            )),
            None => None,
        };
        let capability = if self.sequential {
            SubmitterCapability::SequentialOnly
        } else {
            detect_capability(&wallet, proposer.as_ref()).await?
        };
        let submitter = match (capability, proposer) {
            (SubmitterCapability::MultisigOwner { .. }, Some(proposer)) => {
                Submitter::Multisig(proposer)
            }
            (SubmitterCapability::AtomicCapable, _) => Submitter::Atomic(wallet),
            _ => Submitter::Sequential(wallet),
        };

        let handles = Arc::new(
            GaugeHandles::new(&deployment, provider)
                .with_metadata_resolver(global_config.metadata_resolver()),
        );
        let workflow = ClaimWorkflow::new(handles.clone(), handles, deployment.gauge_address);
        let report = workflow.run(depositor, Some(&submitter)).await?;

        let claimed = format_ether(total_earned(&report.positions));
        match &report.result {
            None => tracing::info!("No positions staked by {depositor}; nothing to claim"),
            Some(SubmissionResult::Batch { id }) => tracing::info!(
                "Claimed {claimed} from {} positions in call bundle {id}",
                report.positions.len()
            ),
            Some(SubmissionResult::Transactions { tx_hashes }) => tracing::info!(
                "Claimed {claimed} from {} positions in {} transactions",
                report.positions.len(),
                tx_hashes.len()
            ),
            Some(SubmissionResult::Proposal(proposal)) => tracing::info!(
                "Proposed claiming {claimed} from {} positions to Safe {} at nonce {}; {} confirmations required",
                report.positions.len(),
                proposal.safe,
                proposal.nonce,
                proposal.threshold
            ),
        }
        for identifier in report.result.iter().flat_map(SubmissionResult::identifiers) {
            println!("{identifier}");
        }

        Ok(())
    }
}

fn safe_service(deployment: &Deployment) -> anyhow::Result<SafeTransactionService> {
    let url = deployment.safe_tx_service_url.as_deref().context(
        "no Safe Transaction Service known for this chain; please set --safe-tx-service-url",
    )?;
    let url = Url::parse(url).with_context(|| format!("invalid Safe Transaction Service URL {url}"))?;
    Ok(SafeTransactionService::new(url))
}
