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

use alloy::{primitives::utils::format_ether, providers::ProviderBuilder};
use anyhow::Context;
use claimer_rewards::{total_earned, ClaimWorkflow, GaugeHandles, StakedPosition};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use crate::config::{GlobalConfig, TargetConfig};

/// Command to list staked positions and their pending rewards.
#[non_exhaustive]
#[derive(Args, Clone, Debug)]
pub struct ListStaked {
    /// Depositor and deployment to query.
    #[clap(flatten)]
    pub target: TargetConfig,
}

impl ListStaked {
    /// Run the [ListStaked] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        let rpc_url = global_config.require_rpc_url()?;
        let depositor = self
            .target
            .depositor(global_config.private_key.as_ref().map(|signer| signer.address()))?;

        // Connect to the chain.
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

        if positions.is_empty() {
            tracing::info!("No positions staked by {depositor}");
            return Ok(());
        }
        println!("{}", positions_table(&positions));
        tracing::info!("Total pending rewards: {}", format_ether(total_earned(&positions)));

        Ok(())
    }
}

#[derive(Tabled)]
struct PositionRow {
    #[tabled(rename = "Token ID")]
    token_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Pending rewards")]
    earned: String,
}

/// Render positions as a table of token id, name and pending rewards in ether units.
pub fn positions_table(positions: &[StakedPosition]) -> String {
    let rows = positions.iter().map(|position| PositionRow {
        token_id: position.token_id.to_string(),
        name: position.display_name(),
        earned: format_ether(position.earned_rewards),
    });
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}
