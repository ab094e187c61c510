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

use alloy::{hex, providers::ProviderBuilder};
use anyhow::Context;
use claimer_rewards::{ClaimWorkflow, GaugeHandles, TransactionIntent};
use clap::Args;

use crate::config::{GlobalConfig, TargetConfig};

/// Command to print the claim batch for a depositor without sending it.
#[non_exhaustive]
#[derive(Args, Clone, Debug)]
pub struct Compile {
    /// Depositor and deployment to query.
    #[clap(flatten)]
    pub target: TargetConfig,
}

impl Compile {
    /// Run the [Compile] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        let rpc_url = global_config.require_rpc_url()?;
        let depositor = self
            .target
            .depositor(global_config.private_key.as_ref().map(|signer| signer.address()))?;

        let provider = ProviderBuilder::new()
            .connect(rpc_url.as_str())
            .await
            .with_context(|| format!("failed to connect provider to {rpc_url}"))?;
        let deployment = self.target.deployment(&provider).await?;

        let handles = Arc::new(
            GaugeHandles::new(&deployment, provider)
                .with_metadata_resolver(global_config.metadata_resolver()),
        );
        let workflow = ClaimWorkflow::new(handles.clone(), handles, deployment.gauge_address);
        let positions = workflow.get_staked(depositor).await?;
        let batch = workflow.compile_txs(&positions);

        tracing::info!(
            %depositor,
            "Compiled {} transactions for {} positions",
            batch.len(),
            positions.len()
        );
        for intent in &batch {
            println!("{}", format_intent(intent));
        }

        Ok(())
    }
}

/// One line per intent: action, token id, target and calldata.
pub fn format_intent(intent: &TransactionIntent) -> String {
    format!(
        "{:<8} {:>10}  to: {}  data: {}",
        intent.action().to_string(),
        intent.token_id().to_string(),
        intent.target(),
        hex::encode_prefixed(intent.calldata())
    )
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, U256};

    use super::*;

    #[test]
    fn formats_calldata_as_hex() {
        let intent = TransactionIntent::withdraw(Address::repeat_byte(0x39), U256::from(5));
        let line = format_intent(&intent);
        assert!(line.starts_with("withdraw"));
        // withdraw(uint256) selector
        assert!(line.contains("data: 0x2e1a7d4d"));
        assert!(line.ends_with("05"));
    }
}
