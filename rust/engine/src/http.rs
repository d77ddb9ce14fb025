// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`TableStore`] over the table server's REST API.

use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::StatusCode;
use serde_json::Value;

use crate::config::{TableConfig, TableConfigPatch};
use crate::error::{Error, Result};
use crate::persistence::TableStore;

/// Everything but RFC 3986 unreserved characters is escaped in a table id.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// REST client for `/api/v1/tables`.
#[derive(Debug, Clone)]
pub struct HttpTableStore {
    base_url: String,
    http: reqwest::Client,
}

impl HttpTableStore {
    /// Creates a client with a request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn table_url(&self, id: &str) -> String {
        self.url(&format!("/tables/{}", utf8_percent_encode(id, SEGMENT)))
    }

    async fn decode_response(resp: reqwest::Response, id: &str) -> Result<Value> {
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::TableNotFound(id.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Persistence(format!(
                "table server returned {}: {}",
                status,
                body.trim()
            )));
        }
        Ok(resp.json::<Value>().await?)
    }
}

#[async_trait]
impl TableStore for HttpTableStore {
    async fn is_ready(&self) -> bool {
        match self.http.get(self.url("/health")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Table server not reachable");
                false
            }
        }
    }

    async fn fetch_all(&self) -> Result<Vec<TableConfig>> {
        let resp = self.http.get(self.url("/tables")).send().await?;
        let body = Self::decode_response(resp, "*").await?;
        let Value::Array(items) = body else {
            return Err(Error::Persistence("expected a list of tables".into()));
        };

        let total = items.len();
        let tables: Vec<TableConfig> = items
            .into_iter()
            .filter_map(|item| match TableConfig::decode(item) {
                Ok(t) => Some(t),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable table");
                    None
                }
            })
            .collect();
        tracing::debug!(total, decoded = tables.len(), "Fetched tables");
        Ok(tables)
    }

    async fn fetch(&self, id: &str) -> Result<TableConfig> {
        let resp = self.http.get(self.table_url(id)).send().await?;
        TableConfig::decode(Self::decode_response(resp, id).await?)
    }

    async fn save(&self, id: &str, patch: TableConfigPatch) -> Result<TableConfig> {
        let resp = self.http.put(self.table_url(id)).json(&patch).send().await?;
        let saved = TableConfig::decode(Self::decode_response(resp, id).await?)?;
        tracing::debug!(table_id = %id, timestamp = saved.last_update_timestamp, "Saved table");
        Ok(saved)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let resp = self.http.delete(self.table_url(id)).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(Error::TableNotFound(id.to_string())),
            s if s.is_success() => Ok(()),
            s => Err(Error::Persistence(format!("table server returned {}", s))),
        }
    }
}
