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

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::{BlockEntry, NodeError};

/// One shard of the chain, identified by its source and destination group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainPair {
    pub from_group: u32,
    pub to_group: u32,
}

impl ChainPair {
    pub const fn new(from_group: u32, to_group: u32) -> Self {
        Self { from_group, to_group }
    }
}

impl fmt::Display for ChainPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.from_group, self.to_group)
    }
}

/// A validated share, as handed over by the share submission layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub chain: ChainPair,
    pub worker: String,
    pub difficulty: f64,
    pub found_block: bool,
    pub block_hash: Option<String>,
}

impl Share {
    pub fn new(chain: ChainPair, worker: impl Into<String>, difficulty: f64) -> Self {
        Self { chain, worker: worker.into(), difficulty, found_block: false, block_hash: None }
    }

    /// Mark this share as one that also solved a block.
    pub fn with_block(mut self, block_hash: impl Into<String>) -> Self {
        self.found_block = true;
        self.block_hash = Some(block_hash.into());
        self
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PendingBlockParseError {
    #[error("missing ':' separator in pending block entry {0:?}")]
    MissingSeparator(String),

    #[error("empty block hash in pending block entry {0:?}")]
    EmptyHash(String),

    #[error("invalid discovery timestamp in pending block entry {0:?}")]
    BadTimestamp(String),
}

/// A found block awaiting settlement.
///
/// Stored in the registry as `"<block hash>:<discovery millis>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingBlock {
    pub block_hash: String,
    pub discovered_at: i64,
}

impl PendingBlock {
    pub fn new(block_hash: impl Into<String>, discovered_at: i64) -> Self {
        Self { block_hash: block_hash.into(), discovered_at }
    }

    /// Registry member encoding of this entry.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.block_hash, self.discovered_at)
    }

    /// Whether the pool-side lock window has elapsed at `now`.
    pub fn lock_elapsed(&self, now: i64, lock_duration_ms: i64) -> bool {
        now >= self.discovered_at.saturating_add(lock_duration_ms)
    }
}

impl fmt::Display for PendingBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for PendingBlock {
    type Err = PendingBlockParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash, timestamp) =
            s.rsplit_once(':').ok_or_else(|| PendingBlockParseError::MissingSeparator(s.into()))?;
        if hash.is_empty() {
            return Err(PendingBlockParseError::EmptyHash(s.into()));
        }
        let discovered_at =
            timestamp.parse::<i64>().map_err(|_| PendingBlockParseError::BadTimestamp(s.into()))?;
        Ok(Self { block_hash: hash.to_string(), discovered_at })
    }
}

/// Settlement data of a block, derived from a fresh node lookup and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    pub hash: String,
    pub chain: ChainPair,
    pub height: u64,
    /// Coinbase subsidy in smallest chain units.
    pub reward_amount: u128,
    /// Epoch millis after which the coinbase output is spendable.
    pub lock_time: i64,
}

impl BlockData {
    /// Read reward metadata from the block's coinbase, the last transaction of the block.
    pub fn from_entry(block: &BlockEntry) -> Result<Self, NodeError> {
        let coinbase = block.transactions.last().ok_or_else(|| {
            NodeError::Malformed(format!("block {} has no transactions", block.hash))
        })?;
        let output = coinbase.unsigned.fixed_outputs.first().ok_or_else(|| {
            NodeError::Malformed(format!("coinbase of block {} has no outputs", block.hash))
        })?;
        let reward_amount = output.atto_alph_amount.parse::<u128>().map_err(|e| {
            NodeError::Malformed(format!(
                "coinbase amount {:?} of block {}: {e}",
                output.atto_alph_amount, block.hash
            ))
        })?;

        Ok(Self {
            hash: block.hash.clone(),
            chain: block.chain(),
            height: block.height,
            reward_amount,
            lock_time: output.lock_time,
        })
    }

    /// Whether the coinbase can be spent at `now`.
    pub fn is_spendable(&self, now: i64) -> bool {
        self.lock_time <= now
    }
}
