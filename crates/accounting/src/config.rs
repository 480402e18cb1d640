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

//! TOML configuration of the reward scanner. Every field has a default, so an empty file is a
//! valid configuration.

use std::{path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use pool_rewards::{PayoutUnits, COIN_DECIMALS};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::service::RewardsServiceConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConf {
    pub redis_url: String,
    pub pool_size: usize,
}

impl Default for StoreConf {
    fn default() -> Self {
        Self { redis_url: "redis://127.0.0.1:6379".into(), pool_size: 8 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConf {
    pub url: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for NodeConf {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:12973".into(),
            api_key: None,
            request_timeout_secs: 10,
        }
    }
}

impl NodeConf {
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.url).with_context(|| format!("Invalid node URL {}", self.url))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConf {
    pub interval_secs: u64,
    /// Wait after discovery before a block is considered for settlement.
    pub lock_duration_secs: u64,
    /// Time past the lock window after which an unverifiable block is reported.
    pub stale_after_secs: u64,
}

impl Default for ScanConf {
    fn default() -> Self {
        Self { interval_secs: 600, lock_duration_secs: 30_600, stale_after_secs: 86_400 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardsConf {
    /// Decimals between the chain's smallest unit and the unit balances are kept in.
    pub payout_decimals: u32,
}

impl Default for RewardsConf {
    fn default() -> Self {
        Self { payout_decimals: COIN_DECIMALS }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConf,
    pub node: NodeConf,
    pub scan: ScanConf,
    pub rewards: RewardsConf,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate().with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan.interval_secs == 0 {
            bail!("scan.interval_secs must be at least 1");
        }
        if self.store.pool_size == 0 {
            bail!("store.pool_size must be at least 1");
        }
        Ok(())
    }

    pub fn service_config(&self) -> RewardsServiceConfig {
        RewardsServiceConfig {
            interval: Duration::from_secs(self.scan.interval_secs),
            lock_duration: Duration::from_secs(self.scan.lock_duration_secs),
            stale_after: Duration::from_secs(self.scan.stale_after_secs),
        }
    }

    pub fn payout_units(&self) -> PayoutUnits {
        PayoutUnits::new(self.rewards.payout_decimals)
    }
}
