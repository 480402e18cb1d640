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

//! Proportional split of a single block reward.

use std::collections::HashMap;

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Conversion from the chain's smallest unit into the unit balances are credited in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutUnits {
    decimals: u32,
}

impl PayoutUnits {
    pub const fn new(decimals: u32) -> Self {
        Self { decimals }
    }

    /// Payout units equal to the smallest chain unit.
    pub const fn smallest() -> Self {
        Self { decimals: 0 }
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Convert an amount expressed in smallest chain units into payout units.
    pub fn convert(&self, amount: f64) -> f64 {
        if self.decimals == 0 {
            amount
        } else {
            amount / 10f64.powi(self.decimals as i32)
        }
    }
}

impl Default for PayoutUnits {
    fn default() -> Self {
        Self::new(crate::COIN_DECIMALS)
    }
}

/// Rewards computed for one block.
#[derive(Debug, Clone)]
pub struct BlockRewardSplit {
    /// Coinbase subsidy of the block, in smallest chain units.
    pub reward_amount: u128,
    /// Sum of all difficulties in the frozen round.
    pub total_difficulty: f64,
    /// Reward per worker, in payout units.
    pub rewards: HashMap<String, f64>,
}

impl BlockRewardSplit {
    /// Sum of all worker rewards, in payout units.
    pub fn total_rewards(&self) -> f64 {
        self.rewards.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

/// Sum of the difficulties of a round. Fails on values that cannot be a recorded difficulty.
pub fn total_difficulty(shares: &HashMap<String, f64>) -> anyhow::Result<f64> {
    let mut total = 0f64;
    for (worker, difficulty) in shares {
        if !difficulty.is_finite() || *difficulty < 0.0 {
            bail!("invalid difficulty {difficulty} recorded for worker {worker}");
        }
        total += difficulty;
    }
    Ok(total)
}

/// Split `reward_amount` over the workers of a frozen round in proportion to their
/// submitted difficulty.
///
/// Each worker receives `units.convert(reward_amount * (difficulty / total))`. A round with
/// no difficulty yields an empty split.
pub fn split_block_reward(
    reward_amount: u128,
    shares: &HashMap<String, f64>,
    units: PayoutUnits,
) -> anyhow::Result<BlockRewardSplit> {
    let total = total_difficulty(shares)?;
    let mut rewards = HashMap::with_capacity(shares.len());

    if total > 0.0 {
        let reward = reward_amount as f64;
        for (worker, difficulty) in shares {
            if *difficulty == 0.0 {
                continue;
            }
            let worker_reward = units.convert(reward * (difficulty / total));
            tracing::trace!(
                "Worker {worker} earns {worker_reward} for difficulty {difficulty} of {total}"
            );
            rewards.insert(worker.clone(), worker_reward);
        }
    }

    Ok(BlockRewardSplit { reward_amount, total_difficulty: total, rewards })
}
