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

//! Re-encoding of a [Batch] as a single Safe transaction and its proposal to the Safe
//! Transaction Service.

use alloy::{
    hex,
    primitives::{Address, Bytes, B256, U256},
    providers::Provider,
    signers::{local::PrivateKeySigner, Signer},
    sol_types::SolCall,
};
use anyhow::{bail, ensure, Context};
use async_trait::async_trait;
use claimer_contracts::contracts::{IMultiSend, ISafe};
use serde::Serialize;
use url::Url;

use crate::{
    batch::{Batch, TransactionIntent},
    error::ClaimError,
    metadata::with_trailing_slash,
    submit::MultisigProposer,
};

/// Length of the fixed part of a packed MultiSend entry: operation, to, value and data length.
const MULTI_SEND_HEADER_LEN: usize = 1 + 20 + 32 + 32;

/// Safe transaction operation.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Call = 0,
    DelegateCall = 1,
}

impl TryFrom<u8> for Operation {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Call),
            1 => Ok(Self::DelegateCall),
            other => bail!("unknown Safe operation {other}"),
        }
    }
}

/// One entry of a MultiSend payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiSendTx {
    pub operation: Operation,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl From<&TransactionIntent> for MultiSendTx {
    fn from(intent: &TransactionIntent) -> Self {
        Self {
            operation: Operation::Call,
            to: intent.target(),
            value: intent.value(),
            data: intent.calldata().clone(),
        }
    }
}

/// Pack transactions into the `transactions` argument of `multiSend(bytes)`.
///
/// Each entry is `operation (1) ‖ to (20) ‖ value (32) ‖ data length (32) ‖ data`, with no
/// padding between entries.
pub fn encode_multi_send(txs: &[MultiSendTx]) -> Bytes {
    let capacity = txs.iter().map(|tx| MULTI_SEND_HEADER_LEN + tx.data.len()).sum();
    let mut packed = Vec::with_capacity(capacity);
    for tx in txs {
        packed.push(tx.operation as u8);
        packed.extend_from_slice(tx.to.as_slice());
        packed.extend_from_slice(&tx.value.to_be_bytes::<32>());
        packed.extend_from_slice(&U256::from(tx.data.len()).to_be_bytes::<32>());
        packed.extend_from_slice(&tx.data);
    }
    packed.into()
}

/// Unpack the `transactions` argument of `multiSend(bytes)`.
pub fn decode_multi_send(mut packed: &[u8]) -> anyhow::Result<Vec<MultiSendTx>> {
    let mut txs = Vec::new();
    while !packed.is_empty() {
        ensure!(
            packed.len() >= MULTI_SEND_HEADER_LEN,
            "truncated header in multiSend entry {}",
            txs.len()
        );
        let operation = Operation::try_from(packed[0])?;
        let to = Address::from_slice(&packed[1..21]);
        let value = U256::from_be_slice(&packed[21..53]);
        let data_len = U256::from_be_slice(&packed[53..MULTI_SEND_HEADER_LEN]);
        let remaining = packed.len() - MULTI_SEND_HEADER_LEN;
        ensure!(
            data_len <= U256::from(remaining),
            "multiSend entry declares {data_len} data bytes but only {remaining} remain"
        );
        let end = MULTI_SEND_HEADER_LEN + data_len.to::<usize>();
        let data = Bytes::copy_from_slice(&packed[MULTI_SEND_HEADER_LEN..end]);
        txs.push(MultiSendTx { operation, to, value, data });
        packed = &packed[end..];
    }
    Ok(txs)
}

/// The single transaction a Safe executes for a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SafeTransaction {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub operation: Operation,
}

impl SafeTransaction {
    /// Wrap every intent of the batch into one Safe transaction.
    ///
    /// A batch of one intent is a plain call to its target. Larger batches become a
    /// `multiSend` delegate call to the MultiSendCallOnly contract at `multi_send`.
    pub fn from_batch(batch: &Batch, multi_send: Address) -> anyhow::Result<Self> {
        match batch.intents() {
            [] => bail!("cannot build a Safe transaction from an empty batch"),
            [intent] => Ok(Self {
                to: intent.target(),
                value: intent.value(),
                data: intent.calldata().clone(),
                operation: Operation::Call,
            }),
            intents => {
                let txs: Vec<MultiSendTx> = intents.iter().map(MultiSendTx::from).collect();
                let data = IMultiSend::multiSendCall { transactions: encode_multi_send(&txs) }
                    .abi_encode()
                    .into();
                Ok(Self { to: multi_send, value: U256::ZERO, data, operation: Operation::DelegateCall })
            }
        }
    }

    /// The calls this transaction performs, in execution order.
    pub fn calls(&self) -> anyhow::Result<Vec<MultiSendTx>> {
        match self.operation {
            Operation::Call => Ok(vec![MultiSendTx {
                operation: Operation::Call,
                to: self.to,
                value: self.value,
                data: self.data.clone(),
            }]),
            Operation::DelegateCall => {
                let call = IMultiSend::multiSendCall::abi_decode(&self.data)
                    .context("delegate call is not a multiSend")?;
                decode_multi_send(&call.transactions)
            }
        }
    }
}

/// A batch proposed to a Safe, awaiting owner confirmations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proposal {
    /// Address of the Safe.
    pub safe: Address,
    /// Hash identifying the proposal in the Safe and the Transaction Service.
    pub safe_tx_hash: B256,
    /// Safe nonce the proposal executes at.
    pub nonce: U256,
    /// Number of owner confirmations required to execute it.
    pub threshold: u64,
}

/// Whether a signer may propose to a Safe, and how many confirmations the Safe needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SafeOwnership {
    pub safe: Address,
    pub is_owner: bool,
    pub threshold: u64,
}

/// Body of `POST /api/v1/safes/{safe}/multisig-transactions/`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRequest {
    pub to: String,
    pub value: String,
    pub data: String,
    pub operation: u8,
    pub safe_tx_gas: String,
    pub base_gas: String,
    pub gas_price: String,
    pub gas_token: String,
    pub refund_receiver: String,
    pub nonce: String,
    pub contract_transaction_hash: String,
    pub sender: String,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl ProposalRequest {
    /// Request for a transaction without gas refunds, signed by `sender`.
    pub fn new(
        tx: &SafeTransaction,
        nonce: U256,
        safe_tx_hash: B256,
        sender: Address,
        signature: &[u8],
    ) -> Self {
        Self {
            to: tx.to.to_checksum(None),
            value: tx.value.to_string(),
            data: hex::encode_prefixed(&tx.data),
            operation: tx.operation as u8,
            safe_tx_gas: "0".into(),
            base_gas: "0".into(),
            gas_price: "0".into(),
            gas_token: Address::ZERO.to_checksum(None),
            refund_receiver: Address::ZERO.to_checksum(None),
            nonce: nonce.to_string(),
            contract_transaction_hash: hex::encode_prefixed(safe_tx_hash),
            sender: sender.to_checksum(None),
            signature: hex::encode_prefixed(signature),
            origin: Some(env!("CARGO_PKG_NAME").into()),
        }
    }
}

/// Client for the Safe Transaction Service of one chain.
#[derive(Clone, Debug)]
pub struct SafeTransactionService {
    client: reqwest::Client,
    base_url: Url,
}

impl SafeTransactionService {
    pub fn new(base_url: Url) -> Self {
        Self { client: reqwest::Client::new(), base_url: with_trailing_slash(base_url) }
    }

    fn proposals_url(&self, safe: Address) -> anyhow::Result<Url> {
        let path = format!("api/v1/safes/{}/multisig-transactions/", safe.to_checksum(None));
        Ok(self.base_url.join(&path)?)
    }

    /// Submit a signed proposal for `safe`.
    pub async fn propose(&self, safe: Address, request: &ProposalRequest) -> anyhow::Result<()> {
        let url = self.proposals_url(safe)?;
        tracing::debug!(%url, nonce = %request.nonce, "Posting Safe proposal");
        let response = self.client.post(url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_message = match response.text().await {
                Ok(body) if !body.is_empty() => body,
                _ => "Safe Transaction Service rejected the proposal".to_string(),
            };
            bail!("Safe Transaction Service returned {status}: {error_message}");
        }
        Ok(())
    }
}

/// Proposes batches to a Safe as one of its owners.
pub struct SafeProposer<P> {
    safe: ISafe::ISafeInstance<P>,
    signer: PrivateKeySigner,
    multi_send: Address,
    service: SafeTransactionService,
}

impl<P: Provider> SafeProposer<P> {
    pub fn new(
        safe: Address,
        provider: P,
        signer: PrivateKeySigner,
        multi_send: Address,
        service: SafeTransactionService,
    ) -> Self {
        Self { safe: ISafe::new(safe, provider), signer, multi_send, service }
    }

    pub fn safe_address(&self) -> Address {
        *self.safe.address()
    }

    /// Check that the signer owns the Safe and read its confirmation threshold.
    pub async fn ownership(&self) -> Result<SafeOwnership, ClaimError> {
        let safe = self.safe_address();
        let unavailable = |source: alloy::contract::Error| ClaimError::SafeUnavailable {
            safe,
            source: source.into(),
        };
        let is_owner = self.safe.isOwner(self.signer.address()).call().await.map_err(unavailable)?;
        let threshold =
            self.safe.getThreshold().call().await.map_err(unavailable)?.saturating_to::<u64>();
        Ok(SafeOwnership { safe, is_owner, threshold })
    }
}

#[async_trait]
impl<P: Provider> MultisigProposer for SafeProposer<P> {
    async fn propose(&self, batch: &Batch) -> anyhow::Result<Proposal> {
        let safe = self.safe_address();
        let tx = SafeTransaction::from_batch(batch, self.multi_send)?;

        let nonce = self.safe.nonce().call().await.context("failed to read Safe nonce")?;
        let threshold = self
            .safe
            .getThreshold()
            .call()
            .await
            .context("failed to read Safe threshold")?
            .saturating_to::<u64>();
        let safe_tx_hash = self
            .safe
            .getTransactionHash(
                tx.to,
                tx.value,
                tx.data.clone(),
                tx.operation as u8,
                U256::ZERO,
                U256::ZERO,
                U256::ZERO,
                Address::ZERO,
                Address::ZERO,
                nonce,
            )
            .call()
            .await
            .context("failed to compute Safe transaction hash")?;

        let signature = self.signer.sign_hash(&safe_tx_hash).await?;
        let request = ProposalRequest::new(
            &tx,
            nonce,
            safe_tx_hash,
            self.signer.address(),
            &signature.as_bytes(),
        );
        self.service.propose(safe, &request).await.context("failed to propose Safe transaction")?;

        tracing::info!(%safe, %safe_tx_hash, %nonce, threshold, "Proposed Safe transaction");
        Ok(Proposal { safe, safe_tx_hash, nonce, threshold })
    }
}
