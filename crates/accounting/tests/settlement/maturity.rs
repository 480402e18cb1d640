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

use pool_accounting::{db::keys, node::MockNode, ChainPair};
use tracing_test::traced_test;

use crate::common::{Pool, LOCK_MS, STALE_MS};

const CHAIN: ChainPair = ChainPair::new(2, 3);

#[tokio::test]
async fn block_waits_for_lock_window() {
    let pool = Pool::new();
    pool.find_block(CHAIN, "A", 1.0, "blk1", 5_000).await;
    pool.node.insert_canonical(MockNode::block("blk1", CHAIN, 7, 900, 0)).await;

    let report = pool.service.scan_at(5_000 + LOCK_MS - 1).await.unwrap();
    assert_eq!(report.locked, 1);
    assert_eq!(pool.node.block_lookups().await, 0);
    assert_eq!(pool.balance("A").await, None);

    let report = pool.service.scan_at(5_000 + LOCK_MS).await.unwrap();
    assert_eq!(report.settled, 1);
    assert_eq!(pool.balance("A").await, Some(900.0));
}

#[tokio::test]
async fn locked_coinbase_is_rechecked_every_scan() {
    let pool = Pool::new();
    let unlock = 3 * LOCK_MS;
    pool.find_block(CHAIN, "A", 1.0, "blk1", 0).await;
    pool.node.insert_canonical(MockNode::block("blk1", CHAIN, 7, 900, unlock)).await;

    let report = pool.service.scan_at(LOCK_MS).await.unwrap();
    assert_eq!(report.immature, 1);
    let report = pool.service.scan_at(2 * LOCK_MS).await.unwrap();
    assert_eq!(report.immature, 1);
    assert_eq!(pool.node.block_lookups().await, 2);
    assert_eq!(pool.balance("A").await, None);

    let report = pool.service.scan_at(unlock).await.unwrap();
    assert_eq!(report.settled, 1);
    assert_eq!(pool.balance("A").await, Some(900.0));
}

#[tokio::test]
#[traced_test]
async fn node_outage_never_rolls_back() {
    let pool = Pool::new();
    pool.find_block(CHAIN, "A", 1.0, "blk1", 0).await;
    pool.node.insert_canonical(MockNode::block("blk1", CHAIN, 7, 900, 0)).await;
    pool.node.fail_lookups_of("blk1").await;

    let report = pool.service.scan_at(LOCK_MS).await.unwrap();
    assert_eq!(report.unverified, 1);
    assert_eq!(report.rolled_back, 0);

    let report = pool.service.scan_at(LOCK_MS + STALE_MS + 1).await.unwrap();
    assert_eq!(report.stale, 1);
    assert!(logs_contain("[P-SCAN-STALE]"));
    assert_eq!(pool.pending().await, vec!["blk1:0".to_string()]);
    assert!(pool.store.contains_key(&keys::frozen_round(CHAIN, "blk1")).await);

    pool.node.heal().await;
    let report = pool.service.scan_at(LOCK_MS + STALE_MS + 2).await.unwrap();
    assert_eq!(report.settled, 1);
    assert_eq!(pool.balance("A").await, Some(900.0));
}

#[tokio::test]
async fn unknown_block_stays_pending() {
    let pool = Pool::new();
    pool.find_block(CHAIN, "A", 1.0, "ghost", 0).await;

    let report = pool.service.scan_at(LOCK_MS).await.unwrap();
    assert_eq!(report.unverified, 1);
    assert_eq!(pool.pending().await, vec!["ghost:0".to_string()]);
}

#[tokio::test]
async fn only_ripe_blocks_are_settled() {
    let pool = Pool::new();
    pool.find_block(CHAIN, "A", 1.0, "early", 0).await;
    pool.share(CHAIN, "B", 1.0, 10).await;
    pool.find_block(CHAIN, "A", 1.0, "late", LOCK_MS).await;
    pool.node.insert_canonical(MockNode::block("early", CHAIN, 1, 100, 0)).await;
    pool.node.insert_canonical(MockNode::block("late", CHAIN, 2, 100, 0)).await;

    let report = pool.service.scan_at(LOCK_MS).await.unwrap();
    assert_eq!(report.settled, 1);
    assert_eq!(report.locked, 1);
    assert_eq!(pool.pending().await, vec![format!("late:{LOCK_MS}")]);
    assert_eq!(pool.balance("A").await, Some(100.0));
    assert_eq!(pool.balance("B").await, None);

    pool.service.scan_at(2 * LOCK_MS).await.unwrap();
    assert_eq!(pool.balance("A").await, Some(150.0));
    assert_eq!(pool.balance("B").await, Some(50.0));
}
