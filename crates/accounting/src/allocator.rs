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

use std::collections::{BTreeMap, HashMap};

use pool_rewards::{split_block_reward, PayoutUnits, RewardAggregate};

use crate::{
    db::{keys, Batch, DbError, StoreObj},
    registry::PendingBlockRegistry,
    types::{BlockData, PendingBlock},
};

/// A canonical block whose lock window and coinbase lock have both elapsed.
#[derive(Debug, Clone)]
pub struct ReadyBlock {
    pub entry: PendingBlock,
    pub block: BlockData,
}

/// Result of one settlement commit.
#[derive(Debug, Clone, Default)]
pub struct Settlement {
    /// Blocks whose frozen round and registry entry were removed by the commit.
    pub settled: Vec<String>,
    /// Blocks left pending because their frozen round could not be read or was corrupt.
    pub deferred: Vec<String>,
    /// Amount credited per worker, in payout units.
    pub credited: BTreeMap<String, f64>,
}

/// Pays out matured blocks.
///
/// All blocks handed over in one call share a single aggregate and a single commit: the
/// balance increments are issued in the same atomic batch that deletes the frozen rounds and
/// registry entries, so a round can never be paid twice.
#[derive(Clone)]
pub struct RewardAllocator {
    store: StoreObj,
    units: PayoutUnits,
}

impl RewardAllocator {
    pub fn new(store: StoreObj, units: PayoutUnits) -> Self {
        Self { store, units }
    }

    pub async fn settle(&self, ready: &[ReadyBlock]) -> Result<Settlement, DbError> {
        let mut aggregate = RewardAggregate::new();
        let mut batch = Batch::new();
        let mut settlement = Settlement::default();

        // Outcome per frozen round, true once it is queued for payout. Entries sharing a round
        // follow the first one and never pay it again.
        let mut rounds: HashMap<String, bool> = HashMap::new();

        for ReadyBlock { entry, block } in ready {
            let round_key = keys::frozen_round(block.chain, &block.hash);

            if let Some(&paid) = rounds.get(&round_key) {
                if paid {
                    tracing::warn!(
                        "Duplicate pending entry {entry} for block {}, releasing it unpaid",
                        block.hash
                    );
                    PendingBlockRegistry::queue_release(&mut batch, block.chain, entry);
                } else {
                    settlement.deferred.push(block.hash.clone());
                }
                continue;
            }
            rounds.insert(round_key.clone(), false);

            let shares = match self.store.hash_get_all(&round_key).await {
                Ok(shares) => shares,
                Err(err) => {
                    // Left pending: deleting the round here would lose the shares unpaid.
                    tracing::warn!(
                        "Failed to read frozen round of block {}, retrying next scan: {err}",
                        block.hash
                    );
                    settlement.deferred.push(block.hash.clone());
                    continue;
                }
            };

            let split = match split_block_reward(block.reward_amount, &shares, self.units) {
                Ok(split) => split,
                Err(err) => {
                    tracing::error!(
                        "[P-ALLOC-ROUND]: Frozen round {round_key} of block {} cannot be paid: {err:#}",
                        block.hash
                    );
                    settlement.deferred.push(block.hash.clone());
                    continue;
                }
            };

            if split.is_empty() {
                tracing::warn!(
                    "Block {} has no shares in its frozen round, releasing it without payout",
                    block.hash
                );
            } else {
                tracing::debug!(
                    "Block {} at height {} on chain {} pays {} of {} to {} workers for difficulty {}",
                    block.hash,
                    block.height,
                    block.chain,
                    split.total_rewards(),
                    split.reward_amount,
                    split.rewards.len(),
                    split.total_difficulty
                );
            }

            aggregate.add_block(&split);
            rounds.insert(round_key, true);
            PendingBlockRegistry::queue_release(&mut batch, block.chain, entry);
            settlement.settled.push(block.hash.clone());
        }

        if batch.is_empty() {
            return Ok(settlement);
        }

        if aggregate.is_empty() {
            tracing::debug!("No worker is owed anything for {} blocks", aggregate.blocks());
        }
        for (worker, amount) in aggregate.iter() {
            batch.hash_incr_float(keys::BALANCES, worker.as_str(), *amount);
        }

        if let Err(err) = self.store.exec(batch).await {
            tracing::error!(
                "[P-ALLOC-COMMIT]: Failed to commit settlement of {} blocks, retrying next scan: {err}",
                settlement.settled.len()
            );
            return Err(err);
        }

        tracing::info!(
            "Settled {} blocks, credited {} to {} workers",
            aggregate.blocks(),
            aggregate.total(),
            aggregate.workers()
        );
        settlement.credited = aggregate.into_iter().collect();
        Ok(settlement)
    }
}
