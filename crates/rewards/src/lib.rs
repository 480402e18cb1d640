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

//! Reward arithmetic for pool blocks: the proportional split of a block reward over the
//! shares of its frozen round, and the aggregation of worker rewards across the blocks
//! settled in one scan pass.

pub mod aggregate;
pub mod split;

pub use aggregate::RewardAggregate;
pub use split::{split_block_reward, total_difficulty, BlockRewardSplit, PayoutUnits};

/// Decimals of the chain's smallest coin unit (1 coin = 10^18 smallest units).
pub const COIN_DECIMALS: u32 = 18;
