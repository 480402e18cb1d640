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

//! In-process [PoolStore] with failure injection, for tests.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Batch, DbError, PoolStore, StoreOp};

#[derive(Debug, Clone, Default)]
struct Data {
    hashes: HashMap<String, HashMap<String, f64>>,
    sets: HashMap<String, BTreeSet<String>>,
}

impl Data {
    fn apply(&mut self, op: &StoreOp) -> Result<(), DbError> {
        match op {
            StoreOp::HashIncrFloat { key, field, amount } => {
                *self.hashes.entry(key.clone()).or_default().entry(field.clone()).or_insert(0.0) +=
                    amount;
            }
            StoreOp::SetAdd { key, member } => {
                self.sets.entry(key.clone()).or_default().insert(member.clone());
            }
            StoreOp::SetRemove { key, member } => {
                if let Some(set) = self.sets.get_mut(key) {
                    set.remove(member);
                    if set.is_empty() {
                        self.sets.remove(key);
                    }
                }
            }
            StoreOp::Rename { from, to } => {
                if let Some(hash) = self.hashes.remove(from) {
                    self.hashes.insert(to.clone(), hash);
                } else if let Some(set) = self.sets.remove(from) {
                    self.sets.insert(to.clone(), set);
                } else {
                    return Err(DbError::KeyNotFound(from.clone()));
                }
            }
            StoreOp::Delete { key } => {
                self.hashes.remove(key);
                self.sets.remove(key);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    data: Data,
    committed: Vec<Batch>,
    fail_exec: usize,
    fail_reads: HashSet<String>,
    unavailable: bool,
}

/// Store kept in memory. A batch is applied to a copy of the data and swapped in only if
/// every operation succeeded, which gives the same all-or-nothing visibility as the real
/// store's transactions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to [PoolStore::exec] fail without applying anything.
    pub async fn fail_next_execs(&self, count: usize) {
        self.state.lock().await.fail_exec = count;
    }

    /// Make reads of `key` fail until [MemoryStore::heal_reads] is called.
    pub async fn fail_reads_of(&self, key: impl Into<String>) {
        self.state.lock().await.fail_reads.insert(key.into());
    }

    pub async fn heal_reads(&self) {
        self.state.lock().await.fail_reads.clear();
    }

    /// Make every command fail, as if the connection to the store was lost.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    /// Batches that were committed, oldest first.
    pub async fn committed(&self) -> Vec<Batch> {
        self.state.lock().await.committed.clone()
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        let state = self.state.lock().await;
        state.data.hashes.contains_key(key) || state.data.sets.contains_key(key)
    }

    fn check_read(state: &State, key: &str) -> Result<(), DbError> {
        if state.unavailable {
            return Err(DbError::Unavailable("memory store marked unavailable".into()));
        }
        if state.fail_reads.contains(key) {
            return Err(DbError::Unavailable(format!("injected read failure for {key}")));
        }
        Ok(())
    }
}

#[async_trait]
impl PoolStore for MemoryStore {
    async fn set_members(&self, key: &str) -> Result<Vec<String>, DbError> {
        let state = self.state.lock().await;
        Self::check_read(&state, key)?;
        Ok(state.data.sets.get(key).map(|set| set.iter().cloned().collect()).unwrap_or_default())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, f64>, DbError> {
        let state = self.state.lock().await;
        Self::check_read(&state, key)?;
        Ok(state.data.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<f64>, DbError> {
        let state = self.state.lock().await;
        Self::check_read(&state, key)?;
        Ok(state.data.hashes.get(key).and_then(|hash| hash.get(field)).copied())
    }

    async fn exec(&self, batch: Batch) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        if state.unavailable {
            return Err(DbError::Unavailable("memory store marked unavailable".into()));
        }
        if state.fail_exec > 0 {
            state.fail_exec -= 1;
            return Err(DbError::Unavailable("injected commit failure".into()));
        }

        let mut next = state.data.clone();
        for op in batch.ops() {
            next.apply(op)?;
        }
        state.data = next;
        state.committed.push(batch);
        Ok(())
    }
}
