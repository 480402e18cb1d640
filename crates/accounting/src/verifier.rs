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

use thiserror::Error;

use crate::{
    node::{BlockEntry, NodeError, NodeObj},
    types::ChainPair,
};

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("block lookup failed for {hash}: {source}")]
    Lookup {
        hash: String,
        #[source]
        source: NodeError,
    },

    #[error("header lookup failed for {hash} at height {height} on chain {chain}: {source}")]
    Headers {
        hash: String,
        chain: ChainPair,
        height: u64,
        #[source]
        source: NodeError,
    },

    #[error("no block found at height {height} on chain {chain} for {hash}")]
    NotFound { hash: String, chain: ChainPair, height: u64 },
}

/// Outcome of a successful check against the node.
#[derive(Debug, Clone)]
pub struct Verification {
    pub in_main_chain: bool,
    pub block: BlockEntry,
}

/// Checks whether found blocks are still on the canonical chain.
#[derive(Clone)]
pub struct ChainVerifier {
    node: NodeObj,
}

impl ChainVerifier {
    pub fn new(node: NodeObj) -> Self {
        Self { node }
    }

    /// A block is canonical iff it is the first hash the node reports at its height on its
    /// chain pair. Further hashes at the same height are not consulted.
    pub async fn verify(&self, block_hash: &str) -> Result<Verification, VerifyError> {
        let block = self
            .node
            .get_block(block_hash)
            .await
            .map_err(|source| VerifyError::Lookup { hash: block_hash.to_string(), source })?;

        let chain = block.chain();
        let hashes =
            self.node.get_hashes_at_height(chain, block.height).await.map_err(|source| {
                VerifyError::Headers {
                    hash: block_hash.to_string(),
                    chain,
                    height: block.height,
                    source,
                }
            })?;

        let canonical = hashes.first().ok_or_else(|| VerifyError::NotFound {
            hash: block_hash.to_string(),
            chain,
            height: block.height,
        })?;

        let in_main_chain = canonical == block_hash;
        tracing::debug!(
            "Block {block_hash} at height {} on chain {chain} is {}",
            block.height,
            if in_main_chain { "canonical" } else { "orphaned" }
        );

        Ok(Verification { in_main_chain, block })
    }
}
