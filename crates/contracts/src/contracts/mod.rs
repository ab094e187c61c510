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

//! Smart contract interfaces for the gauge, the position manager and the Safe.

use std::fmt::Debug;

use alloy::{
    primitives::Address,
    rpc::types::{Log, TransactionReceipt},
    sol_types::SolEvent,
};
use anyhow::{Context, Result};

alloy::sol!(
    #![sol(rpc, all_derives)]
    "src/contracts/artifacts/ICLGauge.sol"
);

alloy::sol!(
    #![sol(rpc, all_derives)]
    "src/contracts/artifacts/INonfungiblePositionManager.sol"
);

alloy::sol!(
    #![sol(rpc, all_derives)]
    "src/contracts/artifacts/ISafe.sol"
);

alloy::sol!(
    #![sol(rpc, all_derives)]
    "src/contracts/artifacts/IMultiSend.sol"
);

/// Decode every log emitted by `emitter` on the receipt that matches the event `E`.
pub fn extract_tx_logs<E: SolEvent + Debug + Clone>(
    receipt: &TransactionReceipt,
    emitter: Address,
) -> Result<Vec<Log<E>>, anyhow::Error> {
    receipt
        .inner
        .logs()
        .iter()
        .filter_map(|log| {
            let matches = log.address() == emitter
                && log.topic0().map(|topic| E::SIGNATURE_HASH == *topic).unwrap_or(false);
            if matches {
                Some(
                    log.log_decode::<E>()
                        .with_context(|| format!("failed to decode event {}", E::SIGNATURE)),
                )
            } else {
                tracing::trace!(
                    "skipping log on receipt; not {} from {emitter}: {log:?}",
                    E::SIGNATURE
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use alloy::sol_types::SolCall;

    use super::*;

    // Selectors as deployed on the Optimism gauge and position manager.
    #[test]
    fn gauge_selectors_match_deployed_contract() {
        assert_eq!(ICLGauge::stakedValuesCall::SELECTOR, [0x4b, 0x93, 0x77, 0x63]);
        assert_eq!(ICLGauge::earnedCall::SELECTOR, [0x3e, 0x49, 0x1d, 0x47]);
        assert_eq!(ICLGauge::getRewardCall::SELECTOR, [0x1c, 0x4b, 0x77, 0x4b]);
        assert_eq!(ICLGauge::withdrawCall::SELECTOR, [0x2e, 0x1a, 0x7d, 0x4d]);
        assert_eq!(INonfungiblePositionManager::tokenURICall::SELECTOR, [0xc8, 0x7b, 0x56, 0xdd]);
    }

    #[test]
    fn multi_send_selector() {
        // multiSend(bytes)
        assert_eq!(IMultiSend::multiSendCall::SELECTOR, [0x8d, 0x80, 0xff, 0x0a]);
    }
}
