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

//! Reward accounting for a share-based mining pool on a sharded chain.
//!
//! Shares are credited into an open round per chain pair by the [RoundLedger]. A share that
//! also found a block freezes the round and registers the block as pending. The
//! [RewardsService] periodically walks the pending blocks, checks them against the node with
//! the [ChainVerifier], and hands every matured canonical block to the [RewardAllocator],
//! which credits worker balances in a single atomic commit per scan.

pub mod allocator;
pub mod config;
pub mod db;
pub mod ledger;
pub mod node;
pub mod registry;
pub mod service;
pub mod types;
pub mod verifier;

pub use allocator::{ReadyBlock, RewardAllocator, Settlement};
pub use config::Config;
pub use ledger::{spawn_share_consumer, RoundLedger, ShareError};
pub use registry::PendingBlockRegistry;
pub use service::{RewardsService, RewardsServiceConfig, ScanReport};
pub use types::{BlockData, ChainPair, PendingBlock, Share};
pub use verifier::{ChainVerifier, Verification, VerifyError};

/// Current wall clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
