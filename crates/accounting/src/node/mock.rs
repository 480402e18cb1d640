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

//! Scriptable [NodeClient] for tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{BlockEntry, FixedOutput, NodeClient, NodeError, Transaction, UnsignedTx};
use crate::types::ChainPair;

#[derive(Debug, Default)]
struct State {
    blocks: HashMap<String, BlockEntry>,
    hashes: HashMap<(ChainPair, u64), Vec<String>>,
    failing_blocks: HashSet<String>,
    failing_heights: HashSet<(ChainPair, u64)>,
    block_lookups: usize,
}

#[derive(Debug, Default)]
pub struct MockNode {
    state: Mutex<State>,
}

impl MockNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// A block with a single coinbase paying `reward` and spendable from `lock_time`.
    pub fn block(
        hash: &str,
        chain: ChainPair,
        height: u64,
        reward: u128,
        lock_time: i64,
    ) -> BlockEntry {
        BlockEntry {
            hash: hash.to_string(),
            chain_from: chain.from_group,
            chain_to: chain.to_group,
            height,
            transactions: vec![Transaction {
                unsigned: UnsignedTx {
                    fixed_outputs: vec![FixedOutput {
                        atto_alph_amount: reward.to_string(),
                        lock_time,
                    }],
                },
            }],
        }
    }

    pub async fn insert_block(&self, block: BlockEntry) {
        self.state.lock().await.blocks.insert(block.hash.clone(), block);
    }

    /// Insert `block` and report it as the canonical block at its height.
    pub async fn insert_canonical(&self, block: BlockEntry) {
        let mut state = self.state.lock().await;
        state.hashes.insert((block.chain(), block.height), vec![block.hash.clone()]);
        state.blocks.insert(block.hash.clone(), block);
    }

    pub async fn set_hashes(&self, chain: ChainPair, height: u64, hashes: Vec<String>) {
        self.state.lock().await.hashes.insert((chain, height), hashes);
    }

    /// Make lookups of `block_hash` fail as if the node were unreachable.
    pub async fn fail_lookups_of(&self, block_hash: impl Into<String>) {
        self.state.lock().await.failing_blocks.insert(block_hash.into());
    }

    /// Make hash lookups at `height` on `chain` fail as if the node were unreachable.
    pub async fn fail_hashes_at(&self, chain: ChainPair, height: u64) {
        self.state.lock().await.failing_heights.insert((chain, height));
    }

    pub async fn heal(&self) {
        let mut state = self.state.lock().await;
        state.failing_blocks.clear();
        state.failing_heights.clear();
    }

    /// Number of block lookups served so far, failed ones included.
    pub async fn block_lookups(&self) -> usize {
        self.state.lock().await.block_lookups
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn get_block(&self, block_hash: &str) -> Result<BlockEntry, NodeError> {
        let mut state = self.state.lock().await;
        state.block_lookups += 1;
        if state.failing_blocks.contains(block_hash) {
            return Err(NodeError::Status { status: 503, detail: "node unavailable".into() });
        }
        state
            .blocks
            .get(block_hash)
            .cloned()
            .ok_or_else(|| NodeError::NotFound(format!("block {block_hash}")))
    }

    async fn get_hashes_at_height(
        &self,
        chain: ChainPair,
        height: u64,
    ) -> Result<Vec<String>, NodeError> {
        let state = self.state.lock().await;
        if state.failing_heights.contains(&(chain, height)) {
            return Err(NodeError::Status { status: 503, detail: "node unavailable".into() });
        }
        Ok(state.hashes.get(&(chain, height)).cloned().unwrap_or_default())
    }
}
