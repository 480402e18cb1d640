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

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_redis::{Config as RedisPoolConfig, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;

use super::{Batch, DbError, PoolStore, StoreOp};

/// [PoolStore] backed by Redis. Batches run as a single `MULTI`/`EXEC` pipeline.
///
/// Redis does not roll back a transaction when one of its commands fails at execution time,
/// so batches must be built such that no command can fail once queued. The rename in a
/// block freeze is always preceded by an increment of the same key for this reason.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(redis_url: &str, pool_size: usize) -> Result<Self, DbError> {
        let mut config = RedisPoolConfig::from_url(redis_url);
        config.pool = Some(PoolConfig::new(pool_size));
        let pool = config.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }

    /// Round trip to the server, used to fail fast on startup.
    pub async fn ping(&self) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl PoolStore for RedisStore {
    async fn set_members(&self, key: &str) -> Result<Vec<String>, DbError> {
        let mut conn = self.pool.get().await?;
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, f64>, DbError> {
        let mut conn = self.pool.get().await?;
        let fields: HashMap<String, f64> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<f64>, DbError> {
        let mut conn = self.pool.get().await?;
        let value: Option<f64> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn exec(&self, batch: Batch) -> Result<(), DbError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in batch.ops() {
            match op {
                StoreOp::HashIncrFloat { key, field, amount } => {
                    pipe.cmd("HINCRBYFLOAT").arg(key).arg(field).arg(*amount).ignore();
                }
                StoreOp::SetAdd { key, member } => {
                    pipe.sadd(key, member).ignore();
                }
                StoreOp::SetRemove { key, member } => {
                    pipe.srem(key, member).ignore();
                }
                StoreOp::Rename { from, to } => {
                    pipe.rename(from, to).ignore();
                }
                StoreOp::Delete { key } => {
                    pipe.del(key).ignore();
                }
            }
        }

        let mut conn = self.pool.get().await?;
        tracing::trace!("Executing batch of {} commands", batch.len());
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires REDIS_URL"]
    async fn test_batch_round_trip() {
        let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
        let store = RedisStore::new(&url, 2).unwrap();
        store.ping().await.unwrap();

        let suffix = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let open = format!("test:{suffix}:open");
        let frozen = format!("test:{suffix}:frozen");
        let set = format!("test:{suffix}:set");

        let mut batch = Batch::new();
        batch
            .hash_incr_float(&open, "worker", 1.5)
            .hash_incr_float(&open, "worker", 2.0)
            .rename(&open, &frozen)
            .set_add(&set, "member");
        store.exec(batch).await.unwrap();

        assert!(store.hash_get_all(&open).await.unwrap().is_empty());
        assert_eq!(store.hash_get(&frozen, "worker").await.unwrap(), Some(3.5));
        assert_eq!(store.set_members(&set).await.unwrap(), vec!["member".to_string()]);

        let mut cleanup = Batch::new();
        cleanup.delete(&frozen).set_remove(&set, "member");
        store.exec(cleanup).await.unwrap();
        assert!(store.hash_get_all(&frozen).await.unwrap().is_empty());
        assert!(store.set_members(&set).await.unwrap().is_empty());
    }
}
