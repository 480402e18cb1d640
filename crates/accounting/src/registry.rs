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

use crate::{
    db::{keys, Batch, DbError, StoreObj},
    types::{ChainPair, PendingBlock, PendingBlockParseError},
};

/// A registry member that could not be decoded, kept verbatim so it can be reported.
#[derive(Debug, Clone)]
pub struct MalformedEntry {
    pub raw: String,
    pub error: PendingBlockParseError,
}

/// The global set of found blocks awaiting settlement.
///
/// Entries are only ever written as part of a larger [Batch]: added together with the round
/// freeze, removed together with the frozen round deletion.
#[derive(Clone)]
pub struct PendingBlockRegistry {
    store: StoreObj,
}

impl PendingBlockRegistry {
    pub fn new(store: StoreObj) -> Self {
        Self { store }
    }

    /// Current entries, split into decodable entries and malformed members. Sorted by
    /// discovery time so older blocks are settled first.
    pub async fn list(&self) -> Result<(Vec<PendingBlock>, Vec<MalformedEntry>), DbError> {
        let members = self.store.set_members(keys::PENDING_BLOCKS).await?;

        let mut entries = Vec::with_capacity(members.len());
        let mut malformed = Vec::new();
        for raw in members {
            match raw.parse::<PendingBlock>() {
                Ok(entry) => entries.push(entry),
                Err(error) => malformed.push(MalformedEntry { raw, error }),
            }
        }
        entries.sort_by(|a, b| {
            a.discovered_at.cmp(&b.discovered_at).then_with(|| a.block_hash.cmp(&b.block_hash))
        });

        Ok((entries, malformed))
    }

    /// The pending entry of `block_hash`, if the block is already registered.
    pub async fn find(&self, block_hash: &str) -> Result<Option<PendingBlock>, DbError> {
        let (entries, _) = self.list().await?;
        Ok(entries.into_iter().find(|entry| entry.block_hash == block_hash))
    }

    /// Queue registration of a newly found block.
    pub fn queue_add(batch: &mut Batch, entry: &PendingBlock) {
        batch.set_add(keys::PENDING_BLOCKS, entry.encode());
    }

    /// Queue removal of a block together with its frozen round.
    pub fn queue_release(batch: &mut Batch, chain: ChainPair, entry: &PendingBlock) {
        batch
            .delete(keys::frozen_round(chain, &entry.block_hash))
            .set_remove(keys::PENDING_BLOCKS, entry.encode());
    }

    /// Drop a block that will never be paid: its frozen round and its entry go in one commit.
    pub async fn rollback(&self, chain: ChainPair, entry: &PendingBlock) -> Result<(), DbError> {
        let mut batch = Batch::new();
        Self::queue_release(&mut batch, chain, entry);
        self.store.exec(batch).await
    }
}
