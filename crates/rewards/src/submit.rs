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

//! Submission of a compiled [Batch]: atomically, one transaction at a time, or as a Safe
//! proposal.

use std::{fmt, sync::Arc};

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;

use crate::{
    batch::{Batch, TransactionIntent},
    error::ClaimError,
    safe::{Proposal, SafeOwnership},
};

/// How the signer can submit a batch. Decided once, before anything is sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitterCapability {
    /// The wallet executes a list of calls as one atomic operation.
    AtomicCapable,
    /// Every intent is sent as its own transaction.
    SequentialOnly,
    /// The signer owns the Safe the batch is proposed to.
    MultisigOwner { safe: Address, threshold: u64 },
}

impl fmt::Display for SubmitterCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtomicCapable => write!(f, "atomic"),
            Self::SequentialOnly => write!(f, "sequential"),
            Self::MultisigOwner { safe, threshold } => {
                write!(f, "multisig ({safe}, threshold {threshold})")
            }
        }
    }
}

/// Pick the submission path.
///
/// A configured Safe always takes precedence: an owner proposes to it, anyone else is rejected.
/// Without a Safe, atomic batching is used when the wallet supports it.
pub fn decide_capability(
    signer: Address,
    safe: Option<SafeOwnership>,
    atomic_supported: bool,
) -> Result<SubmitterCapability, ClaimError> {
    match safe {
        Some(SafeOwnership { safe, is_owner: true, threshold }) => {
            Ok(SubmitterCapability::MultisigOwner { safe, threshold })
        }
        Some(SafeOwnership { safe, is_owner: false, .. }) => {
            Err(ClaimError::NotSafeOwner { signer, safe })
        }
        None if atomic_supported => Ok(SubmitterCapability::AtomicCapable),
        None => Ok(SubmitterCapability::SequentialOnly),
    }
}

/// Whether a `wallet_getCapabilities` response advertises atomic batching on `chain_id`.
///
/// Accepts the `atomic.status` capability (`supported` or `ready`) as well as the older
/// `atomicBatch.supported` flag. The `0x0` key applies to every chain.
pub fn supports_atomic_batching(capabilities: &Value, chain_id: u64) -> bool {
    let Some(chains) = capabilities.as_object() else {
        return false;
    };
    chains
        .iter()
        .filter(|(key, _)| parse_chain_key(key).is_some_and(|id| id == chain_id || id == 0))
        .any(|(_, capabilities)| {
            let status = capabilities.pointer("/atomic/status").and_then(Value::as_str);
            matches!(status, Some("supported" | "ready"))
                || capabilities
                    .pointer("/atomicBatch/supported")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
        })
}

fn parse_chain_key(key: &str) -> Option<u64> {
    let digits = key.strip_prefix("0x").or_else(|| key.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}

/// Identifier(s) of a successful submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionResult {
    /// The whole batch executed as one atomic operation.
    Batch { id: String },
    /// One transaction per intent, in batch order.
    Transactions { tx_hashes: Vec<B256> },
    /// The batch awaits confirmations in a Safe.
    Proposal(Proposal),
}

impl SubmissionResult {
    /// Printable identifiers, one per submitted unit.
    pub fn identifiers(&self) -> Vec<String> {
        match self {
            Self::Batch { id } => vec![id.clone()],
            Self::Transactions { tx_hashes } => tx_hashes.iter().map(|h| h.to_string()).collect(),
            Self::Proposal(proposal) => vec![proposal.safe_tx_hash.to_string()],
        }
    }
}

/// Sends intents from the signer's own account.
#[async_trait]
pub trait IntentSender: Send + Sync {
    /// Broadcast one intent and return its transaction hash without waiting for inclusion.
    async fn broadcast(&self, intent: &TransactionIntent) -> anyhow::Result<B256>;

    /// Wait until the transaction is mined and fail if it reverted.
    async fn confirm(&self, tx_hash: B256) -> anyhow::Result<()>;

    /// Execute the whole batch as one atomic operation and return its identifier.
    async fn send_atomic(&self, batch: &Batch) -> anyhow::Result<String>;
}

#[async_trait]
impl<T: IntentSender + ?Sized> IntentSender for Arc<T> {
    async fn broadcast(&self, intent: &TransactionIntent) -> anyhow::Result<B256> {
        (**self).broadcast(intent).await
    }

    async fn confirm(&self, tx_hash: B256) -> anyhow::Result<()> {
        (**self).confirm(tx_hash).await
    }

    async fn send_atomic(&self, batch: &Batch) -> anyhow::Result<String> {
        (**self).send_atomic(batch).await
    }
}

/// Proposes a batch to a multisig instead of executing it.
#[async_trait]
pub trait MultisigProposer: Send + Sync {
    async fn propose(&self, batch: &Batch) -> anyhow::Result<Proposal>;
}

#[async_trait]
impl<T: MultisigProposer + ?Sized> MultisigProposer for Arc<T> {
    async fn propose(&self, batch: &Batch) -> anyhow::Result<Proposal> {
        (**self).propose(batch).await
    }
}

/// A submitter bound to the path chosen by [decide_capability].
pub enum Submitter<S, M> {
    Atomic(S),
    Sequential(S),
    Multisig(M),
}

impl<S: IntentSender, M: MultisigProposer> Submitter<S, M> {
    pub async fn submit(&self, batch: &Batch) -> Result<SubmissionResult, ClaimError> {
        match self {
            Self::Atomic(sender) => submit_atomic(sender, batch).await,
            Self::Sequential(sender) => submit_sequential(sender, batch).await,
            Self::Multisig(proposer) => submit_multisig(proposer, batch).await,
        }
    }
}

fn ensure_not_empty(batch: &Batch) -> Result<(), ClaimError> {
    if batch.is_empty() {
        return Err(ClaimError::EmptyBatch);
    }
    Ok(())
}

/// Send the batch as one atomic operation.
pub async fn submit_atomic<S: IntentSender + ?Sized>(
    sender: &S,
    batch: &Batch,
) -> Result<SubmissionResult, ClaimError> {
    ensure_not_empty(batch)?;
    let id = sender.send_atomic(batch).await.map_err(|source| ClaimError::SubmissionFailed {
        confirmed: vec![],
        total: batch.len(),
        source,
    })?;
    tracing::info!(%id, intents = batch.len(), "Atomic batch executed");
    Ok(SubmissionResult::Batch { id })
}

/// Send every intent as its own transaction.
///
/// Transactions are broadcast one after the other in batch order, so account nonces keep each
/// claim ahead of its withdraw, and broadcasting stops at the first failure. Receipts are then
/// awaited concurrently. On failure the hashes of the transactions that did confirm are kept in
/// [ClaimError::SubmissionFailed].
pub async fn submit_sequential<S: IntentSender + ?Sized>(
    sender: &S,
    batch: &Batch,
) -> Result<SubmissionResult, ClaimError> {
    ensure_not_empty(batch)?;
    let total = batch.len();

    let mut sent = Vec::with_capacity(total);
    let mut broadcast_error = None;
    for intent in batch {
        match sender.broadcast(intent).await {
            Ok(tx_hash) => {
                tracing::info!(
                    %tx_hash,
                    action = %intent.action(),
                    token_id = %intent.token_id(),
                    "Sent transaction"
                );
                sent.push(tx_hash);
            }
            Err(err) => {
                tracing::warn!(
                    action = %intent.action(),
                    token_id = %intent.token_id(),
                    "Failed to send transaction: {err:#}"
                );
                broadcast_error = Some(err.context(format!(
                    "failed to send {} for position {}",
                    intent.action(),
                    intent.token_id()
                )));
                break;
            }
        }
    }

    let outcomes =
        join_all(sent.iter().map(|&tx_hash| async move { (tx_hash, sender.confirm(tx_hash).await) }))
            .await;

    let mut confirmed = Vec::with_capacity(outcomes.len());
    let mut confirm_error = None;
    for (tx_hash, outcome) in outcomes {
        match outcome {
            Ok(()) => confirmed.push(tx_hash),
            Err(err) => {
                tracing::warn!(%tx_hash, "Transaction failed: {err:#}");
                confirm_error.get_or_insert(err);
            }
        }
    }

    match confirm_error.or(broadcast_error) {
        None => {
            tracing::info!(count = confirmed.len(), "All transactions confirmed");
            Ok(SubmissionResult::Transactions { tx_hashes: confirmed })
        }
        Some(source) => Err(ClaimError::SubmissionFailed { confirmed, total, source }),
    }
}

/// Propose the batch to a multisig.
pub async fn submit_multisig<M: MultisigProposer + ?Sized>(
    proposer: &M,
    batch: &Batch,
) -> Result<SubmissionResult, ClaimError> {
    ensure_not_empty(batch)?;
    let proposal = proposer.propose(batch).await.map_err(|source| {
        ClaimError::SubmissionFailed { confirmed: vec![], total: batch.len(), source }
    })?;
    Ok(SubmissionResult::Proposal(proposal))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, U256};
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        batch::{compile, IntentAction},
        position::StakedPosition,
        test_helpers::{tx_hash, RecordingProposer, RecordingSender},
    };

    const GAUGE: Address = address!("0x3914e354979e6bc63782512Bddb24C224E81a1bD");

    fn batch_for(ids: &[u64]) -> Batch {
        let positions: Vec<_> = ids
            .iter()
            .map(|&id| StakedPosition {
                token_id: U256::from(id),
                earned_rewards: U256::ZERO,
                metadata: Default::default(),
            })
            .collect();
        compile(GAUGE, &positions)
    }

    #[test]
    fn safe_takes_precedence() {
        let signer = Address::repeat_byte(1);
        let safe = Address::repeat_byte(2);
        let owner = SafeOwnership { safe, is_owner: true, threshold: 2 };
        assert_eq!(
            decide_capability(signer, Some(owner), true).unwrap(),
            SubmitterCapability::MultisigOwner { safe, threshold: 2 }
        );

        let stranger = SafeOwnership { is_owner: false, ..owner };
        let err = decide_capability(signer, Some(stranger), true).unwrap_err();
        assert!(matches!(err, ClaimError::NotSafeOwner { signer: s, safe: a } if s == signer && a == safe));
    }

    #[test]
    fn wallet_capability_decides_without_safe() {
        let signer = Address::repeat_byte(1);
        assert_eq!(decide_capability(signer, None, true).unwrap(), SubmitterCapability::AtomicCapable);
        assert_eq!(decide_capability(signer, None, false).unwrap(), SubmitterCapability::SequentialOnly);
    }

    #[test]
    fn parses_wallet_capabilities() {
        assert!(supports_atomic_batching(&json!({"0xa": {"atomic": {"status": "supported"}}}), 10));
        assert!(supports_atomic_batching(&json!({"0xa": {"atomic": {"status": "ready"}}}), 10));
        assert!(supports_atomic_batching(&json!({"0x0": {"atomic": {"status": "supported"}}}), 10));
        assert!(supports_atomic_batching(&json!({"0xa": {"atomicBatch": {"supported": true}}}), 10));

        assert!(!supports_atomic_batching(&json!({"0xa": {"atomic": {"status": "unsupported"}}}), 10));
        assert!(!supports_atomic_batching(&json!({"0x1": {"atomic": {"status": "supported"}}}), 10));
        assert!(!supports_atomic_batching(&json!({"0xa": {}}), 10));
        assert!(!supports_atomic_batching(&json!(null), 10));
    }

    #[tokio::test]
    #[traced_test]
    async fn sequential_returns_one_hash_per_intent() {
        let sender = RecordingSender::default();
        let batch = batch_for(&[5, 9]);

        let result = submit_sequential(&sender, &batch).await.unwrap();
        assert_eq!(
            result,
            SubmissionResult::Transactions { tx_hashes: (0..4).map(tx_hash).collect() }
        );
        assert_eq!(sender.broadcasts(), batch.intents());
        assert!(logs_contain("All transactions confirmed"));
    }

    #[tokio::test]
    async fn sequential_stops_broadcasting_after_failure() {
        let sender = RecordingSender::default().failing_broadcast_at(1);
        let batch = batch_for(&[5, 9]);

        let err = submit_sequential(&sender, &batch).await.unwrap_err();
        match err {
            ClaimError::SubmissionFailed { confirmed, total, .. } => {
                assert_eq!(confirmed, vec![tx_hash(0)]);
                assert_eq!(total, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The withdraw of position 5 failed to send, nothing after it was attempted.
        let sent = sender.broadcasts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].action(), IntentAction::Claim);
    }

    #[tokio::test]
    async fn sequential_keeps_confirmed_hashes_on_revert() {
        let sender = RecordingSender::default().failing_confirm_at(2);
        let batch = batch_for(&[5, 9]);

        let err = submit_sequential(&sender, &batch).await.unwrap_err();
        match err {
            ClaimError::SubmissionFailed { confirmed, total, .. } => {
                assert_eq!(confirmed, vec![tx_hash(0), tx_hash(1), tx_hash(3)]);
                assert_eq!(total, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn atomic_yields_single_identifier() {
        let sender = RecordingSender::default();
        let batch = batch_for(&[5, 9]);

        let submitter = Submitter::<_, RecordingProposer>::Atomic(sender);
        let result = submitter.submit(&batch).await.unwrap();
        assert_eq!(result.identifiers().len(), 1);

        let Submitter::Atomic(sender) = submitter else { unreachable!() };
        assert_eq!(sender.atomic_batches(), vec![batch]);
        assert!(sender.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn atomic_failure_confirms_nothing() {
        let sender = RecordingSender::default().failing_atomic();
        let err = submit_atomic(&sender, &batch_for(&[5])).await.unwrap_err();
        assert!(matches!(err, ClaimError::SubmissionFailed { ref confirmed, total: 2, .. } if confirmed.is_empty()));
    }

    #[tokio::test]
    async fn multisig_proposal_matches_sequential_calls() {
        let batch = batch_for(&[5, 9]);
        let proposer = RecordingProposer::default();
        let result = submit_multisig(&proposer, &batch).await.unwrap();
        assert!(matches!(result, SubmissionResult::Proposal(ref p) if p.threshold == 2));

        // The Safe executes exactly the calls a sequential submission would send, in order.
        let sender = RecordingSender::default();
        submit_sequential(&sender, &batch).await.unwrap();
        let sequential: Vec<_> =
            sender.broadcasts().iter().map(|i| (i.target(), i.value(), i.calldata().clone())).collect();
        let proposed: Vec<_> = proposer.proposals()[0]
            .calls()
            .unwrap()
            .into_iter()
            .map(|tx| (tx.to, tx.value, tx.data))
            .collect();
        assert_eq!(proposed, sequential);
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_on_every_path() {
        let batch = Batch::default();
        for submitter in [
            Submitter::<_, RecordingProposer>::Atomic(RecordingSender::default()),
            Submitter::Sequential(RecordingSender::default()),
            Submitter::Multisig(RecordingProposer::default()),
        ] {
            let err = submitter.submit(&batch).await.unwrap_err();
            assert!(matches!(err, ClaimError::EmptyBatch), "unexpected error: {err:?}");
        }
    }
}
