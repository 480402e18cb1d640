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

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use pool_accounting::{
    db::{RedisStore, StoreObj},
    node::{HttpNodeClient, NodeObj},
    Config, RewardsService,
};
use tokio_util::sync::CancellationToken;

/// Arguments for the reward scanner.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct RewardScannerArgs {
    /// Path to the TOML config file. Defaults apply when not set.
    #[clap(short, long, env)]
    config: Option<PathBuf>,

    /// Redis connection URL, overrides the config file.
    #[clap(long, env)]
    redis_url: Option<String>,

    /// Base URL of the node REST API, overrides the config file.
    #[clap(long, env)]
    node_url: Option<String>,

    /// API key sent to the node, overrides the config file.
    #[clap(long, env, hide_env_values = true)]
    node_api_key: Option<String>,

    /// Whether to log in JSON format.
    #[clap(long, env, default_value_t = false)]
    log_json: bool,

    /// Run a single scan and exit.
    #[clap(long, default_value_t = false)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = RewardScannerArgs::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();

    if args.log_json {
        tracing_subscriber::fmt().with_ansi(false).json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_ansi(false).with_env_filter(filter).init();
    }

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(redis_url) = args.redis_url {
        config.store.redis_url = redis_url;
    }
    if let Some(node_url) = args.node_url {
        config.node.url = node_url;
    }
    if args.node_api_key.is_some() {
        config.node.api_key = args.node_api_key;
    }
    config.validate()?;

    let store = RedisStore::new(&config.store.redis_url, config.store.pool_size)?;
    store.ping().await.context("Failed to reach redis")?;
    let store: StoreObj = Arc::new(store);

    let node: NodeObj = Arc::new(HttpNodeClient::new(
        config.node.base_url()?,
        config.node.api_key.as_deref(),
        config.node.request_timeout(),
    )?);

    let units = config.payout_units();
    tracing::info!("Crediting balances with {} payout decimals", units.decimals());
    let service = RewardsService::new(store, node, config.service_config(), units);

    if args.once {
        tracing::info!("Running a single rewards scan");
        let report = service.scan_once().await?;
        tracing::info!("Scan finished: {report}");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let mut handle = service.start(cancel.clone());

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for ctrl-c")?;
            tracing::info!("Shutdown requested, waiting for the current scan to finish");
            cancel.cancel();
            handle.await.context("Rewards scanner task failed")?;
        }
        res = &mut handle => {
            res.context("Rewards scanner task failed")?;
            bail!("Rewards scanner stopped unexpectedly");
        }
    }

    Ok(())
}
