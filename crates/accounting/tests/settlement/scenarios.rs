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

use pool_accounting::{
    db::{keys, PoolStore, StoreOp},
    node::MockNode,
    ChainPair, Share, ShareError,
};

use crate::common::{Pool, LOCK_MS};

const CHAIN: ChainPair = ChainPair::new(0, 0);

#[tokio::test]
async fn block_reward_is_split_by_difficulty_exactly_once() {
    let pool = Pool::new();
    pool.share(CHAIN, "A", 6.0, 100).await;
    pool.share(CHAIN, "B", 30.0, 200).await;
    pool.share(CHAIN, "A", 3.0, 300).await;
    pool.find_block(CHAIN, "A", 1.0, "blk1", 1_000).await;

    let frozen = pool.store.hash_get_all(&keys::frozen_round(CHAIN, "blk1")).await.unwrap();
    assert_eq!(frozen.len(), 2);
    assert_eq!(frozen["A"], 10.0);
    assert_eq!(frozen["B"], 30.0);
    assert_eq!(pool.pending().await, vec!["blk1:1000".to_string()]);

    pool.node.insert_canonical(MockNode::block("blk1", CHAIN, 42, 4_000_000, 0)).await;

    let report = pool.service.scan_at(1_000 + LOCK_MS).await.unwrap();
    assert_eq!(report.settled, 1);
    assert_eq!(pool.balance("A").await, Some(1_000_000.0));
    assert_eq!(pool.balance("B").await, Some(3_000_000.0));
    assert!(pool.pending().await.is_empty());
    assert!(!pool.store.contains_key(&keys::frozen_round(CHAIN, "blk1")).await);

    // Later scans find nothing left to pay.
    let lookups = pool.node.block_lookups().await;
    let report = pool.service.scan_at(10 * LOCK_MS).await.unwrap();
    assert_eq!(report.pending, 0);
    assert_eq!(pool.node.block_lookups().await, lookups);
    assert_eq!(pool.balance("A").await, Some(1_000_000.0));
    assert_eq!(pool.balance("B").await, Some(3_000_000.0));
}

#[tokio::test]
async fn orphaned_block_is_rolled_back_without_touching_the_open_round() {
    let pool = Pool::new();
    let chain = ChainPair::new(1, 2);
    pool.share(chain, "A", 5.0, 100).await;
    pool.find_block(chain, "B", 5.0, "orphan", 200).await;

    // Mining continues into a fresh round while the block waits.
    pool.share(chain, "A", 2.0, 300).await;
    pool.share(chain, "C", 4.0, 400).await;

    pool.node.insert_block(MockNode::block("orphan", chain, 9, 1_000, 0)).await;
    pool.node.set_hashes(chain, 9, vec!["winner".into(), "orphan".into()]).await;

    let report = pool.service.scan_at(200 + LOCK_MS).await.unwrap();
    assert_eq!(report.rolled_back, 1);
    assert_eq!(report.settled, 0);

    assert!(pool.pending().await.is_empty());
    assert!(!pool.store.contains_key(&keys::frozen_round(chain, "orphan")).await);
    assert!(pool.store.hash_get_all(keys::BALANCES).await.unwrap().is_empty());

    let open = pool.store.hash_get_all(&keys::current_round(chain)).await.unwrap();
    assert_eq!(open.len(), 2);
    assert_eq!(open["A"], 2.0);
    assert_eq!(open["C"], 4.0);
}

#[tokio::test]
async fn blocks_maturing_together_are_credited_in_one_increment() {
    let pool = Pool::new();
    let other = ChainPair::new(0, 1);

    pool.share(CHAIN, "A", 1.0, 10).await;
    pool.find_block(CHAIN, "B", 1.0, "blk1", 20).await;
    pool.find_block(other, "A", 3.0, "blk2", 30).await;

    pool.node.insert_canonical(MockNode::block("blk1", CHAIN, 100, 200, 0)).await;
    pool.node.insert_canonical(MockNode::block("blk2", other, 101, 100, 0)).await;

    let report = pool.service.scan_at(30 + LOCK_MS).await.unwrap();
    assert_eq!(report.settled, 2);
    assert_eq!(pool.balance("A").await, Some(200.0));
    assert_eq!(pool.balance("B").await, Some(100.0));

    let settlement = pool.store.committed().await.pop().unwrap();
    let increments: Vec<_> = settlement
        .ops()
        .iter()
        .filter_map(|op| match op {
            StoreOp::HashIncrFloat { key, field, amount } if key == keys::BALANCES => {
                Some((field.clone(), *amount))
            }
            _ => None,
        })
        .collect();
    assert_eq!(increments, vec![("A".to_string(), 200.0), ("B".to_string(), 100.0)]);
}

#[tokio::test]
async fn unreadable_round_is_retried_instead_of_dropped() {
    let pool = Pool::new();
    pool.find_block(CHAIN, "A", 2.0, "blk1", 0).await;
    pool.node.insert_canonical(MockNode::block("blk1", CHAIN, 1, 500, 0)).await;

    pool.store.fail_reads_of(keys::frozen_round(CHAIN, "blk1")).await;
    let report = pool.service.scan_at(LOCK_MS).await.unwrap();
    assert_eq!(report.deferred, 1);
    assert_eq!(report.settled, 0);
    assert_eq!(pool.pending().await, vec!["blk1:0".to_string()]);
    assert_eq!(pool.balance("A").await, None);

    pool.store.heal_reads().await;
    assert!(pool.store.contains_key(&keys::frozen_round(CHAIN, "blk1")).await);
    let report = pool.service.scan_at(LOCK_MS + 1).await.unwrap();
    assert_eq!(report.settled, 1);
    assert_eq!(pool.balance("A").await, Some(500.0));
}

#[tokio::test]
async fn failed_settlement_commit_is_retried_without_double_pay() {
    let pool = Pool::new();
    pool.find_block(CHAIN, "A", 2.0, "blk1", 0).await;
    pool.node.insert_canonical(MockNode::block("blk1", CHAIN, 1, 500, 0)).await;

    pool.store.fail_next_execs(1).await;
    assert!(pool.service.scan_at(LOCK_MS).await.is_err());
    assert_eq!(pool.balance("A").await, None);
    assert_eq!(pool.pending().await.len(), 1);

    pool.service.scan_at(LOCK_MS + 1).await.unwrap();
    pool.service.scan_at(LOCK_MS + 2).await.unwrap();
    assert_eq!(pool.balance("A").await, Some(500.0));
}

#[tokio::test]
async fn redelivered_block_share_does_not_pay_twice() {
    let pool = Pool::new();
    pool.share(CHAIN, "A", 10.0, 10).await;
    pool.share(CHAIN, "B", 30.0, 20).await;
    pool.find_block(CHAIN, "A", 0.0001, "blk", 100).await;

    pool.share(CHAIN, "C", 1.0, 150).await;
    let again = Share::new(CHAIN, "C", 1.0).with_block("blk");
    assert!(matches!(
        pool.ledger.record_share_at(&again, 200).await,
        Err(ShareError::DuplicateBlock { .. })
    ));
    assert_eq!(pool.pending().await, vec!["blk:100".to_string()]);

    pool.node.insert_canonical(MockNode::block("blk", CHAIN, 3, 4_000_000, 0)).await;
    let report = pool.service.scan_at(200 + LOCK_MS).await.unwrap();
    assert_eq!(report.settled, 1);

    let a = pool.balance("A").await.unwrap();
    let b = pool.balance("B").await.unwrap();
    assert!((a + b - 4_000_000.0).abs() < 1e-6);
    assert!((a - 1_000_000.0).abs() < 100.0);
    assert!((b - 3_000_000.0).abs() < 100.0);
    assert_eq!(pool.balance("C").await, None);
}
