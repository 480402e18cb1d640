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

pub mod keys;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod redis;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

#[cfg(any(test, feature = "test-utils"))]
pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

pub type StoreObj = Arc<dyn PoolStore + Send + Sync>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Redis error {0:?}")]
    RedisErr(#[from] ::redis::RedisError),

    #[error("Redis pool error {0:?}")]
    PoolErr(#[from] deadpool_redis::PoolError),

    #[error("Redis pool creation error {0:?}")]
    CreatePoolErr(#[from] deadpool_redis::CreatePoolError),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A single write queued into a [Batch].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    /// Add `amount` to a float hash field, creating it if absent.
    HashIncrFloat { key: String, field: String, amount: f64 },
    SetAdd { key: String, member: String },
    SetRemove { key: String, member: String },
    /// Rename a key. Fails if `from` does not exist.
    Rename { from: String, to: String },
    Delete { key: String },
}

/// Writes accumulated by a component and committed all-or-nothing by [PoolStore::exec].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    ops: Vec<StoreOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash_incr_float(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        amount: f64,
    ) -> &mut Self {
        self.ops.push(StoreOp::HashIncrFloat { key: key.into(), field: field.into(), amount });
        self
    }

    pub fn set_add(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.ops.push(StoreOp::SetAdd { key: key.into(), member: member.into() });
        self
    }

    pub fn set_remove(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.ops.push(StoreOp::SetRemove { key: key.into(), member: member.into() });
        self
    }

    pub fn rename(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.ops.push(StoreOp::Rename { from: from.into(), to: to.into() });
        self
    }

    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(StoreOp::Delete { key: key.into() });
        self
    }

    pub fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Key-value store holding rounds, the pending block registry and balances.
///
/// Reads are single commands; every write goes through [PoolStore::exec] so that related
/// writes become visible together or not at all.
#[async_trait]
pub trait PoolStore {
    /// Members of a set, in no particular order. A missing key is an empty set.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, DbError>;

    /// All fields of a float hash. A missing key is an empty hash.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, f64>, DbError>;

    /// One field of a float hash.
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<f64>, DbError>;

    /// Execute every operation of the batch atomically.
    async fn exec(&self, batch: Batch) -> Result<(), DbError>;
}
