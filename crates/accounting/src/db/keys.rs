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

//! Persisted key layout, shared with deployments of the existing pool.

use crate::types::ChainPair;

/// Set of `"<block hash>:<discovery millis>"` entries.
pub const PENDING_BLOCKS: &str = "pendingBlocks";

/// Hash of worker to credited reward.
pub const BALANCES: &str = "balances";

const CURRENT_ROUND: &str = "currentRound";

fn shares_prefix(chain: ChainPair) -> String {
    format!("{}:{}:shares", chain.from_group, chain.to_group)
}

/// Open round of a chain pair.
pub fn current_round(chain: ChainPair) -> String {
    format!("{}:{CURRENT_ROUND}", shares_prefix(chain))
}

/// Round frozen when `block_hash` was found on `chain`.
pub fn frozen_round(chain: ChainPair, block_hash: &str) -> String {
    format!("{}:{block_hash}", shares_prefix(chain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let chain = ChainPair::new(2, 3);
        assert_eq!(current_round(chain), "2:3:shares:currentRound");
        assert_eq!(frozen_round(chain, "00ff"), "2:3:shares:00ff");
    }
}
