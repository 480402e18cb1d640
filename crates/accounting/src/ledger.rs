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
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    db::{keys, Batch, DbError, StoreObj},
    now_millis,
    registry::PendingBlockRegistry,
    types::{PendingBlock, Share},
};

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("store error {0}")]
    Db(#[from] DbError),

    #[error("share from {0} reports a found block without a block hash")]
    MissingBlockHash(String),

    #[error("share from {worker} has invalid difficulty {difficulty}")]
    InvalidDifficulty { worker: String, difficulty: f64 },

    #[error("block {block_hash} is already pending since {discovered_at}")]
    DuplicateBlock { block_hash: String, discovered_at: i64 },
}

/// Credits shares into the open round of their chain pair and freezes the round when a share
/// found a block.
///
/// Credit is best effort: if the store rejects the write, the share is lost. The next share
/// on the same chain pair continues the open round as usual.
#[derive(Clone)]
pub struct RoundLedger {
    store: StoreObj,
    registry: PendingBlockRegistry,
}

impl RoundLedger {
    pub fn new(store: StoreObj) -> Self {
        Self { registry: PendingBlockRegistry::new(store.clone()), store }
    }

    /// Record a share, discarding any failure after logging it.
    pub async fn handle_share(&self, share: &Share) {
        if let Err(err) = self.record_share(share).await {
            tracing::error!(
                "Failed to record share from {} on chain {}: {err}",
                share.worker,
                share.chain
            );
        }
    }

    pub async fn record_share(&self, share: &Share) -> Result<(), ShareError> {
        self.record_share_at(share, now_millis()).await
    }

    /// Record a share as if it arrived at `now` (epoch millis).
    ///
    /// The increment, the rename of the open round and the registration of the found block
    /// are committed in one batch, so the frozen round and its pending entry appear together.
    pub async fn record_share_at(&self, share: &Share, now: i64) -> Result<(), ShareError> {
        if !share.difficulty.is_finite() || share.difficulty <= 0.0 {
            return Err(ShareError::InvalidDifficulty {
                worker: share.worker.clone(),
                difficulty: share.difficulty,
            });
        }

        let current = keys::current_round(share.chain);
        let mut batch = Batch::new();
        batch.hash_incr_float(&current, &share.worker, share.difficulty);

        if share.found_block {
            let block_hash = share
                .block_hash
                .as_deref()
                .filter(|hash| !hash.is_empty())
                .ok_or_else(|| ShareError::MissingBlockHash(share.worker.clone()))?;

            // A second freeze under the same hash would replace the frozen round.
            if let Some(existing) = self.registry.find(block_hash).await? {
                return Err(ShareError::DuplicateBlock {
                    block_hash: existing.block_hash,
                    discovered_at: existing.discovered_at,
                });
            }
            batch.rename(&current, keys::frozen_round(share.chain, block_hash));
            PendingBlockRegistry::queue_add(&mut batch, &PendingBlock::new(block_hash, now));
        }

        self.store.exec(batch).await?;

        if let Some(hash) = share.block_hash.as_deref().filter(|_| share.found_block) {
            tracing::info!(
                "Block {hash} found by {} on chain {}, round frozen",
                share.worker,
                share.chain
            );
        } else {
            tracing::trace!(
                "Credited {} difficulty to {} on chain {}",
                share.difficulty,
                share.worker,
                share.chain
            );
        }
        Ok(())
    }
}

/// Feed shares from `shares` into the ledger, in arrival order, until the channel closes or
/// `cancel` fires.
pub fn spawn_share_consumer(
    ledger: RoundLedger,
    mut shares: mpsc::Receiver<Share>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                share = shares.recv() => match share {
                    Some(share) => ledger.handle_share(&share).await,
                    None => break,
                },
            }
        }
        tracing::debug!("Share consumer stopped");
    })
}
