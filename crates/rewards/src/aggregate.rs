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

//! Aggregation of worker rewards across the blocks settled together.

use std::collections::{btree_map, BTreeMap};

use crate::split::BlockRewardSplit;

/// Rewards per worker summed over every block added to the aggregate.
///
/// Ordered by worker so the settlement batch is deterministic.
#[derive(Debug, Clone, Default)]
pub struct RewardAggregate {
    by_worker: BTreeMap<String, f64>,
    blocks: usize,
}

impl RewardAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the rewards of one block into the aggregate.
    pub fn add_block(&mut self, split: &BlockRewardSplit) {
        for (worker, reward) in &split.rewards {
            *self.by_worker.entry(worker.clone()).or_insert(0.0) += reward;
        }
        self.blocks += 1;
    }

    /// Number of blocks folded in, including blocks that paid nobody.
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    pub fn workers(&self) -> usize {
        self.by_worker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_worker.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.by_worker.values().sum()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, f64> {
        self.by_worker.iter()
    }
}

impl IntoIterator for RewardAggregate {
    type Item = (String, f64);
    type IntoIter = btree_map::IntoIter<String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.by_worker.into_iter()
    }
}
