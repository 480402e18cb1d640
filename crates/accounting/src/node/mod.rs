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

//! Access to the full node of the sharded chain.

pub mod http;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ChainPair;

pub use self::http::HttpNodeClient;
#[cfg(any(test, feature = "test-utils"))]
pub use self::mock::MockNode;

pub type NodeObj = Arc<dyn NodeClient + Send + Sync>;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("HTTP error {0:?}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid node URL {0:?}")]
    Url(#[from] url::ParseError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Node returned status {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Malformed node response: {0}")]
    Malformed(String),
}

/// A block as returned by `GET /blockflow/blocks/{hash}`. Only the fields the pool reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEntry {
    pub hash: String,
    pub chain_from: u32,
    pub chain_to: u32,
    pub height: u64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl BlockEntry {
    pub fn chain(&self) -> ChainPair {
        ChainPair::new(self.chain_from, self.chain_to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub unsigned: UnsignedTx,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTx {
    #[serde(default)]
    pub fixed_outputs: Vec<FixedOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedOutput {
    /// Amount in smallest units, as a decimal string.
    pub atto_alph_amount: String,
    /// Epoch millis.
    pub lock_time: i64,
}

/// Body of `GET /blockflow/hashes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashesAtHeight {
    pub headers: Vec<String>,
}

#[async_trait]
pub trait NodeClient {
    /// Fetch a block by hash.
    async fn get_block(&self, block_hash: &str) -> Result<BlockEntry, NodeError>;

    /// Hashes of the blocks at `height` on `chain`, canonical block first.
    async fn get_hashes_at_height(
        &self,
        chain: ChainPair,
        height: u64,
    ) -> Result<Vec<String>, NodeError>;
}
