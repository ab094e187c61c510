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

use alloy::primitives::Address;

use crate::{
    aggregate::aggregate,
    batch::{compile, Batch},
    discovery::{discover_positions, StakingReader},
    error::ClaimError,
    metadata::MetadataSource,
    position::{total_earned, StakedPosition},
    submit::{
        submit_multisig, submit_sequential, IntentSender, MultisigProposer, SubmissionResult,
        Submitter,
    },
};

/// Outcome of one end-to-end claim run.
#[derive(Clone, Debug)]
pub struct ClaimReport {
    pub depositor: Address,
    pub positions: Vec<StakedPosition>,
    pub batch: Batch,
    /// `None` when nothing was staked and nothing was submitted.
    pub result: Option<SubmissionResult>,
}

/// Discovery, aggregation, compilation and submission against one gauge.
///
/// Every stage returns its result instead of storing it, so each run starts from a fresh read of
/// the chain.
pub struct ClaimWorkflow<R, M> {
    reader: R,
    metadata: M,
    gauge: Address,
}

impl<R: StakingReader, M: MetadataSource> ClaimWorkflow<R, M> {
    pub fn new(reader: R, metadata: M, gauge: Address) -> Self {
        Self { reader, metadata, gauge }
    }

    pub fn gauge(&self) -> Address {
        self.gauge
    }

    /// Discover the positions staked by `depositor` and read their pending rewards and metadata.
    pub async fn get_staked(&self, depositor: Address) -> Result<Vec<StakedPosition>, ClaimError> {
        let token_ids = discover_positions(&self.reader, depositor).await?;
        let positions = aggregate(&self.reader, &self.metadata, depositor, &token_ids).await?;
        tracing::info!(
            %depositor,
            positions = positions.len(),
            total_earned = %total_earned(&positions),
            "Loaded staked positions"
        );
        Ok(positions)
    }

    /// Compile the claim and withdraw intents for `positions`.
    pub fn compile_txs(&self, positions: &[StakedPosition]) -> Batch {
        compile(self.gauge, positions)
    }

    /// Submit `batch` on the path the submitter was bound to.
    pub async fn execute<S, P>(
        &self,
        batch: &Batch,
        submitter: Option<&Submitter<S, P>>,
    ) -> Result<SubmissionResult, ClaimError>
    where
        S: IntentSender,
        P: MultisigProposer,
    {
        submitter.ok_or(ClaimError::NoSigner)?.submit(batch).await
    }

    /// Send every intent of `batch` as its own transaction, in batch order.
    pub async fn execute_transactions_in_order<S: IntentSender + ?Sized>(
        &self,
        batch: &Batch,
        sender: Option<&S>,
    ) -> Result<SubmissionResult, ClaimError> {
        submit_sequential(sender.ok_or(ClaimError::NoSigner)?, batch).await
    }

    /// Propose `batch` to the Safe behind `proposer`.
    pub async fn execute_safe_transactions<P: MultisigProposer + ?Sized>(
        &self,
        batch: &Batch,
        proposer: Option<&P>,
    ) -> Result<SubmissionResult, ClaimError> {
        submit_multisig(proposer.ok_or(ClaimError::NoSigner)?, batch).await
    }

    /// Claim and withdraw every position of `depositor`.
    ///
    /// Fails with [ClaimError::NoSigner] before reading anything when there is no submitter. A
    /// depositor with nothing staked gets a report without a submission result.
    pub async fn run<S, P>(
        &self,
        depositor: Address,
        submitter: Option<&Submitter<S, P>>,
    ) -> Result<ClaimReport, ClaimError>
    where
        S: IntentSender,
        P: MultisigProposer,
    {
        let submitter = submitter.ok_or(ClaimError::NoSigner)?;
        let positions = self.get_staked(depositor).await?;
        let batch = self.compile_txs(&positions);
        if batch.is_empty() {
            tracing::info!(%depositor, "No staked positions; nothing to submit");
            return Ok(ClaimReport { depositor, positions, batch, result: None });
        }

        let result = submitter.submit(&batch).await?;
        Ok(ClaimReport { depositor, positions, batch, result: Some(result) })
    }
}
