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

use alloy::primitives::{Address, B256, U256};
use thiserror::Error;

/// Errors returned by the claim workflow.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ClaimError {
    /// No signer is available, so nothing can be submitted.
    #[error("no signer available; a private key is required to submit transactions")]
    NoSigner,

    /// The staked token enumeration read failed.
    #[error("failed to discover staked positions for {depositor}")]
    DiscoveryFailed {
        /// Depositor whose positions were being listed.
        depositor: Address,
        /// Underlying read error.
        #[source]
        source: anyhow::Error,
    },

    /// A pending reward or metadata read failed. No positions are returned.
    #[error("failed to aggregate rewards for position {token_id}")]
    AggregationFailed {
        /// First position whose read failed.
        token_id: U256,
        /// Underlying read error.
        #[source]
        source: anyhow::Error,
    },

    /// The batch could not be (fully) submitted.
    ///
    /// `confirmed` holds the hashes of the transactions that were mined successfully before the
    /// failure was observed; it is empty for atomic and multisig submissions.
    #[error("submission failed with {} of {total} transactions confirmed", .confirmed.len())]
    SubmissionFailed {
        /// Hashes of transactions that were confirmed.
        confirmed: Vec<B256>,
        /// Number of intents in the batch.
        total: usize,
        /// First error encountered.
        #[source]
        source: anyhow::Error,
    },

    /// The signer cannot propose transactions to the configured Safe.
    #[error("signer {signer} is not an owner of Safe {safe}")]
    NotSafeOwner {
        /// Address of the signer.
        signer: Address,
        /// Address of the Safe.
        safe: Address,
    },

    /// Reading the Safe owners or threshold failed.
    #[error("failed to query Safe {safe}")]
    SafeUnavailable {
        /// Address of the Safe.
        safe: Address,
        /// Underlying read error.
        #[source]
        source: anyhow::Error,
    },

    /// Submission was requested for a batch without intents.
    #[error("batch contains no transactions")]
    EmptyBatch,
}

/// Errors resolving the metadata behind a position's token URI.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The URI scheme or media type is not one we can resolve.
    #[error("unsupported token URI: {0}")]
    UnsupportedUri(String),

    /// An inline `data:` URI carried an invalid base64 payload.
    #[error("invalid base64 metadata payload")]
    Base64(#[from] base64::DecodeError),

    /// The metadata document is not valid JSON.
    #[error("invalid metadata JSON")]
    Json(#[from] serde_json::Error),

    /// Fetching remote metadata failed.
    #[error("failed to fetch metadata from {url}")]
    Http {
        /// URL that was requested.
        url: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },
}
