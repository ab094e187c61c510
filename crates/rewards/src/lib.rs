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

//! Discovery, reward aggregation and claim batching for positions staked in a gauge.
//!
//! The pipeline runs strictly forward: [discover_positions] lists the token ids a depositor has
//! staked, [aggregate] reads the pending reward and metadata of every position concurrently,
//! [compile] turns the positions into an ordered [Batch] of claim and withdraw intents, and a
//! [Submitter] sends that batch atomically, one transaction at a time, or as a Safe proposal.
//! [ClaimWorkflow] chains the stages.

pub mod aggregate;
pub mod batch;
pub mod discovery;
pub mod error;
pub mod handles;
pub mod metadata;
pub mod position;
pub mod safe;
pub mod submit;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;
pub mod wallet;
pub mod workflow;

pub use aggregate::aggregate;
pub use batch::{compile, Batch, IntentAction, TransactionIntent};
pub use discovery::{discover_positions, StakingReader};
pub use error::{ClaimError, MetadataError};
pub use handles::GaugeHandles;
pub use metadata::{MetadataSource, TokenUriResolver, DEFAULT_IPFS_GATEWAY};
pub use position::{total_earned, MetadataAttribute, PositionMetadata, StakedPosition};
pub use safe::{
    decode_multi_send, encode_multi_send, MultiSendTx, Operation, Proposal, ProposalRequest,
    SafeOwnership, SafeProposer, SafeTransaction, SafeTransactionService,
};
pub use submit::{
    decide_capability, submit_atomic, submit_multisig, submit_sequential,
    supports_atomic_batching, IntentSender, MultisigProposer, SubmissionResult, Submitter,
    SubmitterCapability,
};
pub use wallet::{detect_capability, CallsStatus, WalletSender};
pub use workflow::{ClaimReport, ClaimWorkflow};
