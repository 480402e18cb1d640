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

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    StatusCode,
};
use serde::de::DeserializeOwned;
use url::Url;

use super::{BlockEntry, HashesAtHeight, NodeClient, NodeError};
use crate::types::ChainPair;

const API_KEY_HEADER: &str = "x-api-key";

/// [NodeClient] for the node's REST API.
#[derive(Clone, Debug)]
pub struct HttpNodeClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpNodeClient {
    pub fn new(
        base_url: Url,
        api_key: Option<&str>,
        request_timeout: Duration,
    ) -> Result<Self, NodeError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(key)
                .map_err(|_| NodeError::Malformed("API key is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }
        let client =
            reqwest::Client::builder().timeout(request_timeout).default_headers(headers).build()?;

        // Url::join drops the last path segment unless the base ends with a slash.
        let base_url = if base_url.path().ends_with('/') {
            base_url
        } else {
            let mut with_slash = base_url.clone();
            with_slash.set_path(&format!("{}/", base_url.path()));
            with_slash
        };

        Ok(Self { client, base_url })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, NodeError> {
        tracing::trace!("GET {url}");
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            let detail = response.text().await.unwrap_or_default();
            return Err(NodeError::NotFound(format!("{what}: {detail}")));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NodeError::Status { status: status.as_u16(), detail });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| NodeError::Malformed(format!("{what}: {e}")))
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn get_block(&self, block_hash: &str) -> Result<BlockEntry, NodeError> {
        let url = self.base_url.join("blockflow/blocks/")?.join(block_hash)?;
        self.get_json(url, &format!("block {block_hash}")).await
    }

    async fn get_hashes_at_height(
        &self,
        chain: ChainPair,
        height: u64,
    ) -> Result<Vec<String>, NodeError> {
        let mut url = self.base_url.join("blockflow/hashes")?;
        url.query_pairs_mut()
            .append_pair("fromGroup", &chain.from_group.to_string())
            .append_pair("toGroup", &chain.to_group.to_string())
            .append_pair("height", &height.to_string());

        let hashes: HashesAtHeight =
            self.get_json(url, &format!("hashes at height {height} on chain {chain}")).await?;
        Ok(hashes.headers)
    }
}
