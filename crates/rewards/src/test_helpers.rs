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

//! In-memory implementations of the chain, metadata and submission seams for tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use alloy::{
    hex,
    primitives::{keccak256, Address, B256, U256},
    sol_types::{SolCall, SolEvent, SolValue},
};
use anyhow::bail;
use async_trait::async_trait;
use claimer_contracts::contracts::{ICLGauge, INonfungiblePositionManager, ISafe};
use serde_json::{json, Value};
use wiremock::{Request, Respond, ResponseTemplate};

use crate::{
    batch::{Batch, TransactionIntent},
    discovery::StakingReader,
    metadata::MetadataSource,
    position::PositionMetadata,
    safe::{Proposal, SafeTransaction},
    submit::{IntentSender, MultisigProposer},
};

/// Deterministic hash of the `index`-th transaction broadcast by a [RecordingSender].
pub fn tx_hash(index: usize) -> B256 {
    keccak256(index.to_be_bytes())
}

/// Gauge state held in memory.
#[derive(Debug, Default)]
pub struct FakeGauge {
    staked: HashMap<Address, Vec<U256>>,
    earned: HashMap<(Address, U256), U256>,
    failing_earned: HashSet<U256>,
    fail_discovery: bool,
    earned_calls: AtomicUsize,
}

impl FakeGauge {
    /// Stake `token_id` for `depositor` with `earned` pending reward.
    pub fn with_position(mut self, depositor: Address, token_id: u64, earned: u64) -> Self {
        let token_id = U256::from(token_id);
        self.staked.entry(depositor).or_default().push(token_id);
        self.earned.insert((depositor, token_id), U256::from(earned));
        self
    }

    /// Make the enumeration read fail.
    pub fn failing_discovery(mut self) -> Self {
        self.fail_discovery = true;
        self
    }

    /// Make the pending reward read of `token_id` fail.
    pub fn failing_earned(mut self, token_id: u64) -> Self {
        self.failing_earned.insert(U256::from(token_id));
        self
    }

    /// Number of pending reward reads served so far.
    pub fn earned_calls(&self) -> usize {
        self.earned_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StakingReader for FakeGauge {
    async fn staked_token_ids(&self, depositor: Address) -> anyhow::Result<Vec<U256>> {
        if self.fail_discovery {
            bail!("connection refused");
        }
        Ok(self.staked.get(&depositor).cloned().unwrap_or_default())
    }

    async fn earned(&self, account: Address, token_id: U256) -> anyhow::Result<U256> {
        self.earned_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_earned.contains(&token_id) {
            bail!("execution reverted");
        }
        Ok(self.earned.get(&(account, token_id)).copied().unwrap_or_default())
    }
}

/// Metadata named `Position #<token id>` for every token.
#[derive(Debug, Default)]
pub struct FakeMetadata {
    failing: HashSet<U256>,
}

impl FakeMetadata {
    pub fn failing(mut self, token_id: u64) -> Self {
        self.failing.insert(U256::from(token_id));
        self
    }
}

#[async_trait]
impl MetadataSource for FakeMetadata {
    async fn position_metadata(&self, token_id: U256) -> anyhow::Result<PositionMetadata> {
        if self.failing.contains(&token_id) {
            bail!("metadata gateway timed out");
        }
        Ok(PositionMetadata {
            name: Some(format!("Position #{token_id}")),
            token_uri: format!("data:application/json,{{\"name\":\"Position #{token_id}\"}}"),
            ..Default::default()
        })
    }
}

/// Records everything it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingSender {
    broadcasts: Mutex<Vec<TransactionIntent>>,
    atomic_batches: Mutex<Vec<Batch>>,
    fail_broadcast_at: Option<usize>,
    fail_confirm_at: Option<usize>,
    fail_atomic: bool,
}

impl RecordingSender {
    /// Fail the `index`-th broadcast.
    pub fn failing_broadcast_at(mut self, index: usize) -> Self {
        self.fail_broadcast_at = Some(index);
        self
    }

    /// Report the `index`-th transaction as reverted.
    pub fn failing_confirm_at(mut self, index: usize) -> Self {
        self.fail_confirm_at = Some(index);
        self
    }

    pub fn failing_atomic(mut self) -> Self {
        self.fail_atomic = true;
        self
    }

    /// Intents broadcast so far, in order.
    pub fn broadcasts(&self) -> Vec<TransactionIntent> {
        self.broadcasts.lock().unwrap().clone()
    }

    /// Batches sent atomically so far.
    pub fn atomic_batches(&self) -> Vec<Batch> {
        self.atomic_batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl IntentSender for RecordingSender {
    async fn broadcast(&self, intent: &TransactionIntent) -> anyhow::Result<B256> {
        let mut broadcasts = self.broadcasts.lock().unwrap();
        let index = broadcasts.len();
        if self.fail_broadcast_at == Some(index) {
            bail!("insufficient funds for gas");
        }
        broadcasts.push(intent.clone());
        Ok(tx_hash(index))
    }

    async fn confirm(&self, hash: B256) -> anyhow::Result<()> {
        if let Some(index) = self.fail_confirm_at {
            if hash == tx_hash(index) {
                bail!("transaction {hash} reverted");
            }
        }
        Ok(())
    }

    async fn send_atomic(&self, batch: &Batch) -> anyhow::Result<String> {
        if self.fail_atomic {
            bail!("wallet rejected the batch");
        }
        let mut batches = self.atomic_batches.lock().unwrap();
        batches.push(batch.clone());
        Ok(format!("batch-{}", batches.len()))
    }
}

/// Records proposed Safe transactions instead of posting them.
#[derive(Debug)]
pub struct RecordingProposer {
    pub safe: Address,
    pub multi_send: Address,
    pub threshold: u64,
    proposals: Mutex<Vec<SafeTransaction>>,
}

impl Default for RecordingProposer {
    fn default() -> Self {
        Self {
            safe: Address::repeat_byte(0x5a),
            multi_send: claimer_contracts::deployments::MULTI_SEND_CALL_ONLY,
            threshold: 2,
            proposals: Mutex::default(),
        }
    }
}

impl RecordingProposer {
    pub fn proposals(&self) -> Vec<SafeTransaction> {
        self.proposals.lock().unwrap().clone()
    }
}

#[async_trait]
impl MultisigProposer for RecordingProposer {
    async fn propose(&self, batch: &Batch) -> anyhow::Result<Proposal> {
        let tx = SafeTransaction::from_batch(batch, self.multi_send)?;
        let safe_tx_hash = keccak256(&tx.data);
        let mut proposals = self.proposals.lock().unwrap();
        let nonce = U256::from(proposals.len());
        proposals.push(tx);
        Ok(Proposal { safe: self.safe, safe_tx_hash, nonce, threshold: self.threshold })
    }
}

/// Bundle id returned for every `wallet_sendCalls` request served by [GaugeRpc].
pub const BUNDLE_ID: &str = "0x00b0";

/// Reward paid out in every transaction receipt served by [GaugeRpc].
pub const CLAIMED_PER_TX: u64 = 100;

/// Safe state served by [GaugeRpc].
#[derive(Clone, Debug)]
struct SafeState {
    owners: Vec<Address>,
    threshold: u64,
    nonce: u64,
}

/// JSON-RPC endpoint that answers like a gauge and position manager on Optimism, plus the
/// wallet and Safe methods the submitters use.
///
/// Every depositor sees the same positions. Token URIs are inline JSON documents named
/// `CL Position #<token id>`. Sent transactions get the hash of their calldata, and every
/// receipt carries a `ClaimRewards` log from the Optimism gauge.
#[derive(Clone, Debug)]
pub struct GaugeRpc {
    chain_id: u64,
    positions: Vec<(U256, U256)>,
    fail_calls: bool,
    safe: Option<SafeState>,
    capabilities: Option<Value>,
    calls_statuses: Vec<Value>,
    status_polls: Arc<AtomicUsize>,
    revert_transactions: bool,
}

impl Default for GaugeRpc {
    fn default() -> Self {
        Self {
            chain_id: 10,
            positions: vec![],
            fail_calls: false,
            safe: None,
            capabilities: None,
            calls_statuses: vec![],
            status_polls: Arc::default(),
            revert_transactions: false,
        }
    }
}

impl GaugeRpc {
    pub fn with_position(mut self, token_id: u64, earned: u64) -> Self {
        self.positions.push((U256::from(token_id), U256::from(earned)));
        self
    }

    /// Revert every `eth_call`.
    pub fn failing_calls(mut self) -> Self {
        self.fail_calls = true;
        self
    }

    /// Answer Safe reads for a Safe owned by `owner` alone, at nonce 7.
    pub fn with_safe(mut self, owner: Address, threshold: u64) -> Self {
        self.safe = Some(SafeState { owners: vec![owner], threshold, nonce: 7 });
        self
    }

    /// Answer `wallet_getCapabilities` with `capabilities` instead of an error.
    pub fn with_capabilities(mut self, capabilities: Value) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Answer successive `wallet_getCallsStatus` requests with `statuses`, repeating the last.
    pub fn with_calls_statuses(mut self, statuses: Vec<Value>) -> Self {
        self.calls_statuses = statuses;
        self
    }

    /// Serve receipts with a failed status.
    pub fn reverting_transactions(mut self) -> Self {
        self.revert_transactions = true;
        self
    }

    /// Number of `wallet_getCallsStatus` requests served so far.
    pub fn status_polls(&self) -> usize {
        self.status_polls.load(Ordering::SeqCst)
    }

    /// Hash served by `getTransactionHash` for a Safe transaction with calldata `data`.
    pub fn safe_tx_hash(data: &[u8]) -> B256 {
        keccak256(data)
    }

    fn call_result(&self, input: &[u8]) -> Option<Vec<u8>> {
        let selector = input.get(..4)?;
        if selector == ICLGauge::stakedValuesCall::SELECTOR {
            let token_ids: Vec<U256> = self.positions.iter().map(|(id, _)| *id).collect();
            Some((token_ids,).abi_encode_params())
        } else if selector == ICLGauge::earnedCall::SELECTOR {
            let call = ICLGauge::earnedCall::abi_decode(input).ok()?;
            let (_, earned) = self.positions.iter().find(|(id, _)| *id == call.tokenId)?;
            Some(earned.abi_encode())
        } else if selector == INonfungiblePositionManager::tokenURICall::SELECTOR {
            let call = INonfungiblePositionManager::tokenURICall::abi_decode(input).ok()?;
            let uri = format!(r#"data:application/json,{{"name":"CL Position #{}"}}"#, call.tokenId);
            Some((uri,).abi_encode_params())
        } else {
            self.safe_call_result(selector, input)
        }
    }

    fn safe_call_result(&self, selector: &[u8], input: &[u8]) -> Option<Vec<u8>> {
        let safe = self.safe.as_ref()?;
        if selector == ISafe::isOwnerCall::SELECTOR {
            let call = ISafe::isOwnerCall::abi_decode(input).ok()?;
            Some(safe.owners.contains(&call.owner).abi_encode())
        } else if selector == ISafe::getThresholdCall::SELECTOR {
            Some(U256::from(safe.threshold).abi_encode())
        } else if selector == ISafe::nonceCall::SELECTOR {
            Some(U256::from(safe.nonce).abi_encode())
        } else if selector == ISafe::getTransactionHashCall::SELECTOR {
            let call = ISafe::getTransactionHashCall::abi_decode(input).ok()?;
            Some(Self::safe_tx_hash(&call.data).abi_encode())
        } else {
            None
        }
    }

    fn receipt(&self, tx_hash: &Value) -> Value {
        let gauge = claimer_contracts::deployments::OPTIMISM.gauge_address;
        let claim_topic = ICLGauge::ClaimRewards::SIGNATURE_HASH.to_string();
        let log = |address: Address, topics: Vec<String>, data: String, index: u64| {
            json!({
                "address": address.to_string(),
                "topics": topics,
                "data": data,
                "blockHash": B256::repeat_byte(0xbb).to_string(),
                "blockNumber": "0x1",
                "transactionHash": tx_hash,
                "transactionIndex": "0x0",
                "logIndex": format!("0x{index:x}"),
                "removed": false,
            })
        };
        let claimed = hex::encode_prefixed(U256::from(CLAIMED_PER_TX).to_be_bytes::<32>());
        let logs = vec![
            log(gauge, vec![claim_topic.clone(), B256::ZERO.to_string()], claimed, 0),
            // Same event signature from another contract, without the indexed topic.
            log(Address::repeat_byte(0xee), vec![claim_topic], "0x".into(), 1),
        ];
        json!({
            "transactionHash": tx_hash,
            "transactionIndex": "0x0",
            "blockHash": B256::repeat_byte(0xbb).to_string(),
            "blockNumber": "0x1",
            "from": Address::repeat_byte(0xd1).to_string(),
            "to": gauge.to_string(),
            "cumulativeGasUsed": "0x5208",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x1",
            "contractAddress": null,
            "logs": logs,
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "status": if self.revert_transactions { "0x0" } else { "0x1" },
            "type": "0x2",
        })
    }

    fn result(&self, method: &str, params: &Value) -> Option<Value> {
        match method {
            "eth_chainId" => Some(json!(format!("0x{:x}", self.chain_id))),
            "eth_blockNumber" => Some(json!("0x1")),
            "eth_getBlockByNumber" => Some(Value::Null),
            "eth_call" if !self.fail_calls => {
                let input = hex::decode(transaction_input(&params[0])).ok()?;
                self.call_result(&input).map(|out| json!(hex::encode_prefixed(out)))
            }
            "eth_sendTransaction" => {
                let input = hex::decode(transaction_input(&params[0])).ok()?;
                Some(json!(keccak256(input).to_string()))
            }
            "eth_getTransactionReceipt" => Some(self.receipt(&params[0])),
            "wallet_getCapabilities" => self.capabilities.clone(),
            "wallet_sendCalls" => Some(json!({ "id": BUNDLE_ID })),
            "wallet_getCallsStatus" => {
                let poll = self.status_polls.fetch_add(1, Ordering::SeqCst);
                let last = self.calls_statuses.len().checked_sub(1)?;
                self.calls_statuses.get(poll.min(last)).cloned()
            }
            _ => None,
        }
    }
}

fn transaction_input(tx: &Value) -> &str {
    tx["input"].as_str().or_else(|| tx["data"].as_str()).unwrap_or("0x")
}

impl Respond for GaugeRpc {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let id = body["id"].clone();
        let method = body["method"].as_str().unwrap_or_default();
        let response = match self.result(method, &body["params"]) {
            Some(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            None => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": 3, "message": "execution reverted"},
            }),
        };
        ResponseTemplate::new(200).set_body_json(response)
    }
}
