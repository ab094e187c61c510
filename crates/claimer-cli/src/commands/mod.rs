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

//! Commands of the claimer CLI.

mod claim;
mod compile;
mod list_staked;

pub use claim::Claim;
pub use compile::{format_intent, Compile};
pub use list_staked::{positions_table, ListStaked};

use clap::Subcommand;

use crate::config::GlobalConfig;

/// Commands for gauge reward claiming.
#[derive(Subcommand, Clone, Debug)]
pub enum ClaimerCommands {
    /// List the positions a depositor has staked, with their pending rewards.
    ListStaked(ListStaked),
    /// Print the claim and withdraw transactions for every staked position without sending them.
    Compile(Compile),
    /// Claim the rewards of every staked position and withdraw it.
    Claim(Claim),
}

impl ClaimerCommands {
    /// Run the command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        match self {
            Self::ListStaked(cmd) => cmd.run(global_config).await,
            Self::Compile(cmd) => cmd.run(global_config).await,
            Self::Claim(cmd) => cmd.run(global_config).await,
        }
    }
}
