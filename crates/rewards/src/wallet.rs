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

use std::{borrow::Cow, time::Duration};

use alloy::{
    hex,
    primitives::{utils::format_ether, Address, B256, U256},
    providers::{PendingTransactionBuilder, Provider},
};
use anyhow::{bail, ensure, Context};
use async_trait::async_trait;
use claimer_contracts::contracts::{extract_tx_logs, ICLGauge};
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::{
    batch::{Batch, TransactionIntent},
    error::ClaimError,
    safe::SafeProposer,
    submit::{decide_capability, supports_atomic_batching, IntentSender, SubmitterCapability},
};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// State of an EIP-5792 call bundle as reported by `wallet_getCallsStatus`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallsStatus {
    Pending,
    Confirmed,
    Failed(String),
}

impl CallsStatus {
    /// Interpret a `wallet_getCallsStatus` response.
    ///
    /// Understands the numeric status codes (1xx pending, 200 confirmed, anything else failed)
    /// and the older `PENDING` / `CONFIRMED` strings. A confirmed bundle with a reverted receipt
    /// is reported as failed.
    pub fn from_response(response: &Value) -> Self {
        let status = match response.get("status") {
            Some(Value::Number(code)) => match code.as_u64() {
                Some(100..=199) => Self::Pending,
                Some(200) => Self::Confirmed,
                _ => Self::Failed(format!("status {code}")),
            },
            Some(Value::String(status)) if status.eq_ignore_ascii_case("pending") => Self::Pending,
            Some(Value::String(status)) if status.eq_ignore_ascii_case("confirmed") => {
                Self::Confirmed
            }
            Some(other) => Self::Failed(format!("status {other}")),
            None => Self::Pending,
        };
        if status != Self::Confirmed {
            return status;
        }

        let reverted = response
            .get("receipts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|receipt| receipt.get("status").and_then(Value::as_str))
            .any(|status| status == "0x0");
        if reverted {
            Self::Failed("a call in the bundle reverted".into())
        } else {
            Self::Confirmed
        }
    }
}

/// Sends intents from a single account through the provider's wallet.
#[derive(Clone)]
pub struct WalletSender<P> {
    provider: P,
    from: Address,
    chain_id: u64,
    gauge: Option<Address>,
    tx_timeout: Option<Duration>,
    poll_interval: Duration,
}

impl<P: Provider> WalletSender<P> {
    pub fn new(provider: P, from: Address, chain_id: u64) -> Self {
        Self {
            provider,
            from,
            chain_id,
            gauge: None,
            tx_timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Report the rewards `gauge` pays out in each confirmed transaction.
    pub fn with_gauge(self, gauge: Address) -> Self {
        Self { gauge: Some(gauge), ..self }
    }

    /// Give up waiting for a receipt or bundle after `timeout`.
    pub fn with_timeout(self, tx_timeout: Option<Duration>) -> Self {
        Self { tx_timeout, ..self }
    }

    pub fn with_poll_interval(self, poll_interval: Duration) -> Self {
        Self { poll_interval, ..self }
    }

    pub fn address(&self) -> Address {
        self.from
    }

    /// Ask the wallet whether it can execute call bundles atomically on this chain.
    ///
    /// Wallets without EIP-5792 support are treated as sequential only.
    pub async fn supports_atomic(&self) -> bool {
        let params = (self.from, vec![format!("0x{:x}", self.chain_id)]);
        match self
            .provider
            .raw_request::<_, Value>(Cow::Borrowed("wallet_getCapabilities"), params)
            .await
        {
            Ok(capabilities) => {
                tracing::debug!(%capabilities, "Wallet capabilities");
                supports_atomic_batching(&capabilities, self.chain_id)
            }
            Err(err) => {
                tracing::debug!("wallet_getCapabilities unavailable: {err}");
                false
            }
        }
    }

    async fn calls_status(&self, id: &str) -> anyhow::Result<CallsStatus> {
        let response: Value = self
            .provider
            .raw_request(Cow::Borrowed("wallet_getCallsStatus"), (id,))
            .await
            .context("wallet_getCallsStatus failed")?;
        Ok(CallsStatus::from_response(&response))
    }
}

#[async_trait]
impl<P: Provider> IntentSender for WalletSender<P> {
    async fn broadcast(&self, intent: &TransactionIntent) -> anyhow::Result<B256> {
        let request = intent.to_transaction_request().from(self.from);
        let pending = self.provider.send_transaction(request).await.with_context(|| {
            format!("failed to send {} transaction for position {}", intent.action(), intent.token_id())
        })?;
        Ok(*pending.tx_hash())
    }

    async fn confirm(&self, tx_hash: B256) -> anyhow::Result<()> {
        tracing::debug!(timeout = ?self.tx_timeout, %tx_hash, "Waiting for transaction receipt");
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .with_timeout(self.tx_timeout)
            .get_receipt()
            .await
            .with_context(|| format!("failed to receive receipt for {tx_hash}"))?;
        ensure!(receipt.status(), "transaction reverted: tx_hash = {tx_hash}");

        let Some(gauge) = self.gauge else {
            return Ok(());
        };
        match extract_tx_logs::<ICLGauge::ClaimRewards>(&receipt, gauge) {
            Ok(logs) => {
                let claimed = logs.iter().map(|log| log.data().amount).sum::<U256>();
                if claimed > U256::ZERO {
                    tracing::info!(%tx_hash, "Claimed {} reward tokens", format_ether(claimed));
                }
            }
            Err(err) => tracing::warn!(%tx_hash, "Failed to read claimed rewards: {err:#}"),
        }
        Ok(())
    }

    async fn send_atomic(&self, batch: &Batch) -> anyhow::Result<String> {
        let calls: Vec<Value> = batch
            .iter()
            .map(|intent| {
                json!({
                    "to": intent.target().to_checksum(None),
                    "data": hex::encode_prefixed(intent.calldata()),
                    "value": format!("0x{:x}", intent.value()),
                })
            })
            .collect();
        let request = json!({
            "version": "2.0.0",
            "chainId": format!("0x{:x}", self.chain_id),
            "from": self.from.to_checksum(None),
            "atomicRequired": true,
            "calls": calls,
        });

        let response: Value = self
            .provider
            .raw_request(Cow::Borrowed("wallet_sendCalls"), (request,))
            .await
            .context("wallet_sendCalls failed")?;
        let id = response
            .get("id")
            .and_then(Value::as_str)
            .or_else(|| response.as_str())
            .context("wallet_sendCalls returned no bundle id")?
            .to_string();
        tracing::info!(%id, calls = batch.len(), "Sent atomic call bundle");

        let deadline = self.tx_timeout.map(|timeout| Instant::now() + timeout);
        loop {
            match self.calls_status(&id).await? {
                CallsStatus::Confirmed => return Ok(id),
                CallsStatus::Failed(reason) => bail!("call bundle {id} failed: {reason}"),
                CallsStatus::Pending => {}
            }
            if let Some(deadline) = deadline {
                ensure!(Instant::now() < deadline, "timed out waiting for call bundle {id}");
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Decide how the signer behind `wallet` submits, probing the Safe when one is configured.
pub async fn detect_capability<P: Provider, Q: Provider>(
    wallet: &WalletSender<P>,
    safe: Option<&SafeProposer<Q>>,
) -> Result<SubmitterCapability, ClaimError> {
    let capability = match safe {
        Some(proposer) => {
            decide_capability(wallet.address(), Some(proposer.ownership().await?), false)?
        }
        None => decide_capability(wallet.address(), None, wallet.supports_atomic().await)?,
    };
    tracing::info!(%capability, "Selected submission path");
    Ok(capability)
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::{keccak256, U256},
        providers::{ProviderBuilder, RootProvider},
        signers::local::PrivateKeySigner,
    };
    use claimer_contracts::deployments::{MULTI_SEND_CALL_ONLY, OPTIMISM};
    use serde_json::json;
    use tracing_test::traced_test;
    use url::Url;
    use wiremock::{matchers::method, Mock, MockServer};

    use super::*;
    use crate::{
        safe::SafeTransactionService,
        test_helpers::{GaugeRpc, BUNDLE_ID},
    };

    const SIGNER_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    async fn rpc_server(rpc: GaugeRpc) -> (MockServer, RootProvider) {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(rpc).mount(&server).await;
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_http(server.uri().parse().unwrap());
        (server, provider)
    }

    fn wallet(provider: RootProvider) -> WalletSender<RootProvider> {
        let signer: PrivateKeySigner = SIGNER_KEY.parse().unwrap();
        WalletSender::new(provider, signer.address(), 10)
            .with_gauge(OPTIMISM.gauge_address)
            .with_poll_interval(Duration::from_millis(10))
    }

    fn proposer(provider: RootProvider, safe: Address) -> SafeProposer<RootProvider> {
        let service = SafeTransactionService::new(Url::parse("http://127.0.0.1:1").unwrap());
        SafeProposer::new(safe, provider, SIGNER_KEY.parse().unwrap(), MULTI_SEND_CALL_ONLY, service)
    }

    fn claim_batch() -> Batch {
        let claim = TransactionIntent::claim(OPTIMISM.gauge_address, U256::from(5));
        let withdraw = TransactionIntent::withdraw(OPTIMISM.gauge_address, U256::from(5));
        Batch::from_intents(vec![claim, withdraw])
    }

    #[tokio::test]
    async fn wallet_without_capabilities_is_sequential() {
        let (_server, provider) = rpc_server(GaugeRpc::default()).await;
        let wallet = wallet(provider);
        assert!(!wallet.supports_atomic().await);
        let capability = detect_capability::<_, RootProvider>(&wallet, None).await.unwrap();
        assert_eq!(capability, SubmitterCapability::SequentialOnly);
    }

    #[tokio::test]
    async fn advertised_atomic_support_is_atomic() {
        let rpc = GaugeRpc::default()
            .with_capabilities(json!({"0xa": {"atomic": {"status": "supported"}}}));
        let (_server, provider) = rpc_server(rpc).await;
        let capability = detect_capability::<_, RootProvider>(&wallet(provider), None).await.unwrap();
        assert_eq!(capability, SubmitterCapability::AtomicCapable);
    }

    #[tokio::test]
    async fn atomic_bundle_is_polled_until_confirmed() {
        let rpc = GaugeRpc::default().with_calls_statuses(vec![
            json!({"status": 100}),
            json!({"status": 100}),
            json!({"status": 200, "receipts": [{"status": "0x1"}]}),
        ]);
        let (_server, provider) = rpc_server(rpc.clone()).await;

        let id = wallet(provider).send_atomic(&claim_batch()).await.unwrap();
        assert_eq!(id, BUNDLE_ID);
        assert_eq!(rpc.status_polls(), 3);
    }

    #[tokio::test]
    async fn atomic_bundle_with_reverted_call_fails() {
        let rpc = GaugeRpc::default().with_calls_statuses(vec![
            json!({"status": 200, "receipts": [{"status": "0x1"}, {"status": "0x0"}]}),
        ]);
        let (_server, provider) = rpc_server(rpc).await;

        let err = wallet(provider).send_atomic(&claim_batch()).await.unwrap_err();
        assert!(err.to_string().contains(BUNDLE_ID), "unexpected error: {err:#}");
    }

    #[tokio::test]
    async fn atomic_bundle_times_out() {
        let rpc = GaugeRpc::default().with_calls_statuses(vec![json!({"status": 100})]);
        let (_server, provider) = rpc_server(rpc).await;

        let wallet = wallet(provider).with_timeout(Some(Duration::from_millis(50)));
        let err = wallet.send_atomic(&claim_batch()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "unexpected error: {err:#}");
    }

    #[tokio::test]
    async fn broadcast_sends_intent_calldata() {
        let (_server, provider) = rpc_server(GaugeRpc::default()).await;
        let intent = TransactionIntent::claim(OPTIMISM.gauge_address, U256::from(5));

        let tx_hash = wallet(provider).broadcast(&intent).await.unwrap();
        assert_eq!(tx_hash, keccak256(intent.calldata()));
    }

    #[tokio::test]
    #[traced_test]
    async fn confirm_reports_rewards_from_the_gauge_only() {
        let (_server, provider) = rpc_server(GaugeRpc::default()).await;
        let wallet = wallet(provider);

        // The receipt also carries an undecodable ClaimRewards log from another contract.
        wallet.confirm(B256::repeat_byte(1)).await.unwrap();
        assert!(logs_contain("reward tokens"));
        assert!(!logs_contain("Failed to read claimed rewards"));
    }

    #[tokio::test]
    async fn reverted_transaction_is_not_confirmed() {
        let (_server, provider) = rpc_server(GaugeRpc::default().reverting_transactions()).await;
        let err = wallet(provider).confirm(B256::repeat_byte(1)).await.unwrap_err();
        assert!(err.to_string().contains("reverted"), "unexpected error: {err:#}");
    }

    #[tokio::test]
    async fn safe_owner_proposes() {
        let safe = Address::repeat_byte(0x5a);
        let signer: PrivateKeySigner = SIGNER_KEY.parse().unwrap();
        let (_server, provider) = rpc_server(GaugeRpc::default().with_safe(signer.address(), 2)).await;

        let proposer = proposer(provider.clone(), safe);
        let capability = detect_capability(&wallet(provider), Some(&proposer)).await.unwrap();
        assert_eq!(capability, SubmitterCapability::MultisigOwner { safe, threshold: 2 });
    }

    #[tokio::test]
    async fn safe_non_owner_is_rejected() {
        let safe = Address::repeat_byte(0x5a);
        let (_server, provider) =
            rpc_server(GaugeRpc::default().with_safe(Address::repeat_byte(0x0f), 1)).await;

        let proposer = proposer(provider.clone(), safe);
        let err = detect_capability(&wallet(provider), Some(&proposer)).await.unwrap_err();
        assert!(matches!(err, ClaimError::NotSafeOwner { safe: s, .. } if s == safe), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn unreadable_safe_is_unavailable() {
        let safe = Address::repeat_byte(0x5a);
        let (_server, provider) = rpc_server(GaugeRpc::default()).await;

        let proposer = proposer(provider.clone(), safe);
        let err = detect_capability(&wallet(provider), Some(&proposer)).await.unwrap_err();
        assert!(matches!(err, ClaimError::SafeUnavailable { safe: s, .. } if s == safe), "unexpected error: {err:?}");
    }

    #[test]
    fn numeric_status_codes() {
        assert_eq!(CallsStatus::from_response(&json!({"status": 100})), CallsStatus::Pending);
        assert_eq!(CallsStatus::from_response(&json!({"status": 200})), CallsStatus::Confirmed);
        assert!(matches!(
            CallsStatus::from_response(&json!({"status": 500})),
            CallsStatus::Failed(_)
        ));
    }

    #[test]
    fn legacy_status_strings() {
        assert_eq!(CallsStatus::from_response(&json!({"status": "PENDING"})), CallsStatus::Pending);
        assert_eq!(
            CallsStatus::from_response(&json!({"status": "CONFIRMED", "receipts": []})),
            CallsStatus::Confirmed
        );
    }

    #[test]
    fn reverted_receipt_fails_bundle() {
        let response = json!({
            "status": 200,
            "receipts": [{"status": "0x1"}, {"status": "0x0"}],
        });
        assert!(matches!(CallsStatus::from_response(&response), CallsStatus::Failed(_)));
    }
}
