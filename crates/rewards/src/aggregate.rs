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

use alloy::primitives::{Address, U256};
use futures_util::future::{try_join, try_join_all};

use crate::{
    discovery::StakingReader, error::ClaimError, metadata::MetadataSource,
    position::StakedPosition,
};

/// Read the pending reward and metadata of every position concurrently.
///
/// The result follows the order of `token_ids`. If any read fails the whole aggregation fails
/// with the first error observed and no positions are returned.
pub async fn aggregate<R, M>(
    reader: &R,
    metadata_source: &M,
    depositor: Address,
    token_ids: &[U256],
) -> Result<Vec<StakedPosition>, ClaimError>
where
    R: StakingReader + ?Sized,
    M: MetadataSource + ?Sized,
{
    let fetches = token_ids.iter().map(|&token_id| async move {
        let (earned_rewards, metadata) = try_join(
            reader.earned(depositor, token_id),
            metadata_source.position_metadata(token_id),
        )
        .await
        .map_err(|source| ClaimError::AggregationFailed { token_id, source })?;
        tracing::debug!(%token_id, %earned_rewards, "Read pending reward");
        Ok::<_, ClaimError>(StakedPosition { token_id, earned_rewards, metadata })
    });

    let positions = try_join_all(fetches).await?;
    tracing::debug!(%depositor, count = positions.len(), "Aggregated staked positions");
    Ok(positions)
}
