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

use std::{sync::Arc, time::Duration};

use pool_accounting::{
    db::{keys, MemoryStore, PoolStore},
    node::MockNode,
    ChainPair, RewardsService, RewardsServiceConfig, RoundLedger, Share,
};
use pool_rewards::PayoutUnits;

pub const LOCK_MS: i64 = 60_000;
pub const STALE_MS: i64 = 600_000;

/// Ledger and scanner wired to the same in-memory store and mock node.
pub struct Pool {
    pub store: Arc<MemoryStore>,
    pub node: Arc<MockNode>,
    pub ledger: RoundLedger,
    pub service: RewardsService,
}

impl Pool {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let node = Arc::new(MockNode::new());
        let config = RewardsServiceConfig {
            interval: Duration::from_secs(1),
            lock_duration: Duration::from_millis(LOCK_MS as u64),
            stale_after: Duration::from_millis(STALE_MS as u64),
        };
        let service =
            RewardsService::new(store.clone(), node.clone(), config, PayoutUnits::smallest());
        Self { ledger: RoundLedger::new(store.clone()), store, node, service }
    }

    pub async fn share(&self, chain: ChainPair, worker: &str, difficulty: f64, at: i64) {
        self.ledger.record_share_at(&Share::new(chain, worker, difficulty), at).await.unwrap();
    }

    pub async fn find_block(
        &self,
        chain: ChainPair,
        worker: &str,
        difficulty: f64,
        hash: &str,
        at: i64,
    ) {
        let share = Share::new(chain, worker, difficulty).with_block(hash);
        self.ledger.record_share_at(&share, at).await.unwrap();
    }

    pub async fn balance(&self, worker: &str) -> Option<f64> {
        self.store.hash_get(keys::BALANCES, worker).await.unwrap()
    }

    pub async fn pending(&self) -> Vec<String> {
        self.store.set_members(keys::PENDING_BLOCKS).await.unwrap()
    }
}
