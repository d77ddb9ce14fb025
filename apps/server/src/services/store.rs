// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Disk-backed table store using cacache.
//!
//! Each table is one entry keyed `table:{id}`. The set of ids lives in a
//! separate index entry so listing does not scan the cache. Writes hold an
//! async mutex so the index and the entries never interleave.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bimtable_engine::{now_millis, Error, Result, TableConfig, TableConfigPatch, TableStore};
use rustc_hash::FxHashSet;
use serde_json::Value;
use tokio::sync::Mutex;

const INDEX_KEY: &str = "tables:index";

fn table_key(id: &str) -> String {
    format!("table:{}", id)
}

fn storage_error(err: cacache::Error) -> Error {
    Error::Persistence(err.to_string())
}

/// Named-table store in a cacache directory.
#[derive(Debug)]
pub struct DiskTableStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl DiskTableStore {
    /// Opens the store, creating the directory when needed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            Error::Persistence(format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_json(&self, key: &str) -> Result<Option<Value>> {
        match cacache::read(&self.dir, key).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn write_json(&self, key: &str, value: &impl serde::Serialize) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        cacache::write(&self.dir, key, &data)
            .await
            .map_err(storage_error)?;
        tracing::debug!(key = %key, size = data.len(), "Wrote entry");
        Ok(())
    }

    async fn read_index(&self) -> Result<Vec<String>> {
        match self.read_json(INDEX_KEY).await? {
            None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|e| {
                Error::Persistence(format!("corrupt table index: {}", e))
            }),
        }
    }

    async fn read_table(&self, id: &str) -> Result<Option<TableConfig>> {
        match self.read_json(&table_key(id)).await? {
            Some(value) => TableConfig::decode(value).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TableStore for DiskTableStore {
    async fn is_ready(&self) -> bool {
        tokio::fs::metadata(&self.dir).await.is_ok()
    }

    async fn fetch_all(&self) -> Result<Vec<TableConfig>> {
        let ids = self.read_index().await?;
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut tables = Vec::with_capacity(ids.len());
        for id in ids.iter().filter(|id| seen.insert(id.as_str())) {
            match self.read_table(id).await {
                Ok(Some(table)) => tables.push(table),
                Ok(None) => tracing::warn!(table_id = %id, "Indexed table has no entry"),
                Err(e) => tracing::warn!(table_id = %id, error = %e, "Skipping unreadable table"),
            }
        }
        tables.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(tables)
    }

    async fn fetch(&self, id: &str) -> Result<TableConfig> {
        self.read_table(id)
            .await?
            .ok_or_else(|| Error::TableNotFound(id.to_string()))
    }

    async fn save(&self, id: &str, patch: TableConfigPatch) -> Result<TableConfig> {
        let _guard = self.write_lock.lock().await;

        let mut table = match self.read_table(id).await? {
            Some(existing) => existing,
            None => {
                let name = patch.name.clone().unwrap_or_else(|| id.to_string());
                tracing::info!(table_id = %id, name = %name, "Creating table");
                TableConfig::new(id, name)
            }
        };
        table.apply_patch(patch);
        table.last_update_timestamp = now_millis();
        self.write_json(&table_key(id), &table).await?;

        let mut ids = self.read_index().await?;
        if !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
            self.write_json(INDEX_KEY, &ids).await?;
        }
        Ok(table)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut ids = self.read_index().await?;
        let before = ids.len();
        ids.retain(|known| known != id);
        if ids.len() == before {
            return Err(Error::TableNotFound(id.to_string()));
        }
        cacache::remove(&self.dir, &table_key(id))
            .await
            .map_err(storage_error)?;
        self.write_json(INDEX_KEY, &ids).await?;
        tracing::info!(table_id = %id, "Deleted table");
        Ok(())
    }
}
