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

//! Compilation of staked positions into claim and withdraw transaction intents.

use std::fmt;

use alloy::{
    primitives::{Address, Bytes, U256},
    rpc::types::TransactionRequest,
    sol_types::SolCall,
};
use claimer_contracts::contracts::ICLGauge;

use crate::position::StakedPosition;

/// What an intent does to its position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntentAction {
    /// `getReward(tokenId)` on the gauge.
    Claim,
    /// `withdraw(tokenId)` on the gauge.
    Withdraw,
}

impl fmt::Display for IntentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claim => write!(f, "claim"),
            Self::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// An unsigned, fully parameterized contract call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionIntent {
    target: Address,
    calldata: Bytes,
    value: U256,
    token_id: U256,
    action: IntentAction,
}

impl TransactionIntent {
    /// Intent claiming the pending reward of `token_id` from `gauge`.
    pub fn claim(gauge: Address, token_id: U256) -> Self {
        Self {
            target: gauge,
            calldata: ICLGauge::getRewardCall { tokenId: token_id }.abi_encode().into(),
            value: U256::ZERO,
            token_id,
            action: IntentAction::Claim,
        }
    }

    /// Intent withdrawing the position `token_id` from `gauge`.
    pub fn withdraw(gauge: Address, token_id: U256) -> Self {
        Self {
            target: gauge,
            calldata: ICLGauge::withdrawCall { tokenId: token_id }.abi_encode().into(),
            value: U256::ZERO,
            token_id,
            action: IntentAction::Withdraw,
        }
    }

    pub fn target(&self) -> Address {
        self.target
    }

    pub fn calldata(&self) -> &Bytes {
        &self.calldata
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn token_id(&self) -> U256 {
        self.token_id
    }

    pub fn action(&self) -> IntentAction {
        self.action
    }

    /// Build a transaction request for this intent. Sender, nonce and fees are left to the
    /// provider's fillers.
    pub fn to_transaction_request(&self) -> TransactionRequest {
        TransactionRequest::default()
            .to(self.target)
            .input(self.calldata.clone().into())
            .value(self.value)
    }
}

/// Ordered intents for one submission attempt.
///
/// Intents for the same token id are contiguous, and the claim always precedes the withdraw.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    intents: Vec<TransactionIntent>,
}

impl Batch {
    pub(crate) fn from_intents(intents: Vec<TransactionIntent>) -> Self {
        Self { intents }
    }

    pub fn intents(&self) -> &[TransactionIntent] {
        &self.intents
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransactionIntent> {
        self.intents.iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a TransactionIntent;
    type IntoIter = std::slice::Iter<'a, TransactionIntent>;

    fn into_iter(self) -> Self::IntoIter {
        self.intents.iter()
    }
}

/// Compile the claim and withdraw intents for every position, in position order.
pub fn compile(gauge: Address, positions: &[StakedPosition]) -> Batch {
    let intents = positions
        .iter()
        .flat_map(|position| {
            [
                TransactionIntent::claim(gauge, position.token_id),
                TransactionIntent::withdraw(gauge, position.token_id),
            ]
        })
        .collect();
    Batch::from_intents(intents)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;
    use crate::position::PositionMetadata;

    const GAUGE: Address = address!("0x3914e354979e6bc63782512Bddb24C224E81a1bD");

    fn position(token_id: u64, earned: u64) -> StakedPosition {
        StakedPosition {
            token_id: U256::from(token_id),
            earned_rewards: U256::from(earned),
            metadata: PositionMetadata::default(),
        }
    }

    #[test]
    fn empty_positions_compile_to_empty_batch() {
        let batch = compile(GAUGE, &[]);
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn claim_precedes_withdraw_for_every_position() {
        let positions: Vec<_> = [3, 1, 4, 15, 9].into_iter().map(|id| position(id, id)).collect();
        let batch = compile(GAUGE, &positions);
        assert_eq!(batch.len(), 2 * positions.len());

        for position in &positions {
            let index_of = |action| {
                batch
                    .iter()
                    .position(|i| i.token_id() == position.token_id && i.action() == action)
                    .unwrap()
            };
            let claim = index_of(IntentAction::Claim);
            let withdraw = index_of(IntentAction::Withdraw);
            assert_eq!(claim + 1, withdraw, "intents of {} are not contiguous", position.token_id);
        }
    }

    #[test]
    fn encodes_gauge_calls() {
        let batch = compile(GAUGE, &[position(5, 100), position(9, 0)]);
        let decoded: Vec<_> = batch
            .iter()
            .map(|intent| {
                assert_eq!(intent.target(), GAUGE);
                assert_eq!(intent.value(), U256::ZERO);
                match intent.action() {
                    IntentAction::Claim => {
                        let call = ICLGauge::getRewardCall::abi_decode(intent.calldata()).unwrap();
                        (IntentAction::Claim, call.tokenId)
                    }
                    IntentAction::Withdraw => {
                        let call = ICLGauge::withdrawCall::abi_decode(intent.calldata()).unwrap();
                        (IntentAction::Withdraw, call.tokenId)
                    }
                }
            })
            .collect();
        assert_eq!(
            decoded,
            vec![
                (IntentAction::Claim, U256::from(5)),
                (IntentAction::Withdraw, U256::from(5)),
                (IntentAction::Claim, U256::from(9)),
                (IntentAction::Withdraw, U256::from(9)),
            ]
        );
    }

    #[test]
    fn transaction_request_carries_intent() {
        let intent = TransactionIntent::claim(GAUGE, U256::from(5));
        let request = intent.to_transaction_request();
        assert_eq!(request.to, Some(GAUGE.into()));
        assert_eq!(request.input.input(), Some(intent.calldata()));
        assert_eq!(request.value, Some(U256::ZERO));
    }
}
