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

use std::fmt;

use pool_rewards::PayoutUnits;
use tokio::{
    task::JoinHandle,
    time::{Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    allocator::{ReadyBlock, RewardAllocator},
    db::{DbError, StoreObj},
    node::NodeObj,
    now_millis,
    registry::PendingBlockRegistry,
    types::{BlockData, PendingBlock},
    verifier::ChainVerifier,
};

#[derive(Clone, Debug)]
pub struct RewardsServiceConfig {
    /// Time between two scans.
    pub interval: Duration,
    /// Time a found block must wait after discovery before it is considered for settlement.
    pub lock_duration: Duration,
    /// Time past the lock window after which a block the node cannot verify is reported.
    pub stale_after: Duration,
}

impl Default for RewardsServiceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            lock_duration: Duration::from_secs(30_600),
            stale_after: Duration::from_secs(86_400),
        }
    }
}

/// Counts of what happened to each pending entry during one scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub pending: usize,
    pub malformed: usize,
    /// Still inside the lock window.
    pub locked: usize,
    /// The node could not answer; retried next scan.
    pub unverified: usize,
    /// Subset of `unverified` that has been unverifiable for too long.
    pub stale: usize,
    pub rolled_back: usize,
    /// Canonical, but the coinbase output is not spendable yet.
    pub immature: usize,
    /// Canonical, but the coinbase could not be read.
    pub unreadable: usize,
    pub settled: usize,
    /// Ready, but the frozen round could not be paid this scan.
    pub deferred: usize,
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pending={} malformed={} locked={} unverified={} stale={} rolled_back={} immature={} \
             unreadable={} settled={} deferred={}",
            self.pending,
            self.malformed,
            self.locked,
            self.unverified,
            self.stale,
            self.rolled_back,
            self.immature,
            self.unreadable,
            self.settled,
            self.deferred
        )
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Periodic scan over the pending block registry.
#[derive(Clone)]
pub struct RewardsService {
    registry: PendingBlockRegistry,
    verifier: ChainVerifier,
    allocator: RewardAllocator,
    config: RewardsServiceConfig,
}

impl RewardsService {
    pub fn new(
        store: StoreObj,
        node: NodeObj,
        config: RewardsServiceConfig,
        units: PayoutUnits,
    ) -> Self {
        Self {
            registry: PendingBlockRegistry::new(store.clone()),
            verifier: ChainVerifier::new(node),
            allocator: RewardAllocator::new(store, units),
            config,
        }
    }

    pub async fn scan_once(&self) -> Result<ScanReport, DbError> {
        self.scan_at(now_millis()).await
    }

    /// Run one scan as if the clock read `now` (epoch millis).
    ///
    /// Entries are verified one at a time. Every block that is ready is settled in a single
    /// commit at the end of the scan.
    pub async fn scan_at(&self, now: i64) -> Result<ScanReport, DbError> {
        let start_time = std::time::Instant::now();
        let (entries, malformed) = self.registry.list().await?;

        let mut report =
            ScanReport { pending: entries.len(), malformed: malformed.len(), ..Default::default() };
        for entry in &malformed {
            tracing::warn!(
                "Skipping malformed pending block entry {:?}: {}",
                entry.raw,
                entry.error
            );
        }

        let lock_ms = duration_millis(self.config.lock_duration);
        let stale_ms = duration_millis(self.config.stale_after);

        let mut ready = Vec::new();
        for entry in entries {
            if !entry.lock_elapsed(now, lock_ms) {
                tracing::debug!("Block {} is still in its lock window", entry.block_hash);
                report.locked += 1;
                continue;
            }
            if let Some(block) = self.check_entry(&entry, now, lock_ms, stale_ms, &mut report).await
            {
                ready.push(ReadyBlock { entry, block });
            }
        }

        if !ready.is_empty() {
            let settlement = self.allocator.settle(&ready).await?;
            report.settled = settlement.settled.len();
            report.deferred = settlement.deferred.len();
        }

        tracing::info!("Scan completed in {:.2}s: {report}", start_time.elapsed().as_secs_f64());
        Ok(report)
    }

    /// Verify one entry whose lock window has elapsed, rolling it back if it was orphaned.
    /// Returns the block data when the block is ready to be paid.
    async fn check_entry(
        &self,
        entry: &PendingBlock,
        now: i64,
        lock_ms: i64,
        stale_ms: i64,
        report: &mut ScanReport,
    ) -> Option<BlockData> {
        let verification = match self.verifier.verify(&entry.block_hash).await {
            Ok(verification) => verification,
            Err(err) => {
                report.unverified += 1;
                let stale_at = entry.discovered_at.saturating_add(lock_ms).saturating_add(stale_ms);
                if now > stale_at {
                    report.stale += 1;
                    tracing::error!(
                        "[P-SCAN-STALE]: Block {} discovered at {} still cannot be verified: {err}",
                        entry.block_hash,
                        entry.discovered_at
                    );
                } else {
                    tracing::warn!(
                        "Could not verify block {}, retrying next scan: {err}",
                        entry.block_hash
                    );
                }
                return None;
            }
        };

        let chain = verification.block.chain();
        if !verification.in_main_chain {
            match self.registry.rollback(chain, entry).await {
                Ok(()) => {
                    report.rolled_back += 1;
                    tracing::info!(
                        "Block {} at height {} on chain {chain} is not canonical, rolled back",
                        entry.block_hash,
                        verification.block.height
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        "Failed to roll back orphaned block {}, retrying next scan: {err}",
                        entry.block_hash
                    );
                }
            }
            return None;
        }

        let block = match BlockData::from_entry(&verification.block) {
            Ok(block) => block,
            Err(err) => {
                report.unreadable += 1;
                tracing::warn!("Cannot read coinbase of block {}: {err}", entry.block_hash);
                return None;
            }
        };

        if !block.is_spendable(now) {
            report.immature += 1;
            tracing::debug!(
                "Coinbase of block {} is locked until {}",
                entry.block_hash,
                block.lock_time
            );
            return None;
        }

        Some(block)
    }

    /// Scan every `interval` until `cancel` fires. A scan in progress always runs to the end.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Starting rewards scanner, scanning every {} seconds",
            self.config.interval.as_secs()
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            if let Err(err) = self.scan_once().await {
                tracing::error!("Error running rewards scan: {err}");
            }
        }
        tracing::info!("Rewards scanner stopped");
    }

    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}
