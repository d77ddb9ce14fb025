// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistence collaborator interface and write coordination.
//!
//! - [`TableStore`]: the remote source of truth for named tables
//! - [`UpdateQueue`]: single-flight write serialisation
//! - [`EchoGuard`]: suppresses remote updates that are the echo of our own
//!   save
//! - [`wait_until_ready`]: bounded readiness poll at startup

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::config::{TableConfig, TableConfigPatch};
use crate::error::{Error, Result};

/// Remote store of named table configurations.
///
/// Implementations are eventually consistent: a fetch right after a save
/// may or may not observe it.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Whether the store can serve requests yet.
    async fn is_ready(&self) -> bool {
        true
    }

    async fn fetch_all(&self) -> Result<Vec<TableConfig>>;

    /// Fails with [`Error::TableNotFound`] for unknown ids.
    async fn fetch(&self, id: &str) -> Result<TableConfig>;

    /// Applies a partial update, creating the table when it does not exist,
    /// and returns the stored result.
    async fn save(&self, id: &str, patch: TableConfigPatch) -> Result<TableConfig>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// In-process [`TableStore`].
#[derive(Debug)]
pub struct MemoryTableStore {
    tables: RwLock<FxHashMap<String, TableConfig>>,
    ready: AtomicBool,
}

impl Default for MemoryTableStore {
    fn default() -> Self {
        Self {
            tables: RwLock::new(FxHashMap::default()),
            ready: AtomicBool::new(true),
        }
    }
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that reports not ready until [`MemoryTableStore::set_ready`].
    pub fn pending() -> Self {
        let store = Self::default();
        store.ready.store(false, Ordering::SeqCst);
        store
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.is_empty()
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn fetch_all(&self) -> Result<Vec<TableConfig>> {
        let mut all: Vec<TableConfig> = self.tables.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn fetch(&self, id: &str) -> Result<TableConfig> {
        self.tables
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::TableNotFound(id.to_string()))
    }

    async fn save(&self, id: &str, patch: TableConfigPatch) -> Result<TableConfig> {
        let mut tables = self.tables.write().await;
        let entry = tables.entry(id.to_string()).or_insert_with(|| {
            let name = patch.name.clone().unwrap_or_else(|| id.to_string());
            TableConfig::new(id, name)
        });
        entry.apply_patch(patch);
        entry.last_update_timestamp = now_millis();
        Ok(entry.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self.tables.write().await.remove(id) {
            Some(_) => Ok(()),
            None => Err(Error::TableNotFound(id.to_string())),
        }
    }
}

/// Serialises writes: at most one submitted operation runs at a time.
/// Clones share the same queue.
///
/// Each operation waits for the queue on its own task, so once submitted
/// it runs to completion even if the caller stops awaiting it.
#[derive(Debug, Clone, Default)]
pub struct UpdateQueue {
    gate: Arc<Mutex<()>>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn submit<F, T>(&self, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let gate = Arc::clone(&self.gate);
        let handle = tokio::spawn(async move {
            let _permit = gate.lock_owned().await;
            op.await
        });
        handle
            .await
            .map_err(|e| Error::Persistence(format!("update task failed: {}", e)))?
    }

    /// Whether an operation currently holds the queue.
    pub fn is_busy(&self) -> bool {
        self.gate.try_lock().is_err()
    }
}

/// Remembers when our last save completed so its echo can be ignored.
#[derive(Debug, Clone)]
pub struct EchoGuard {
    window: Duration,
    last_save: Option<Instant>,
}

impl EchoGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_save: None,
        }
    }

    pub fn mark_saved(&mut self) {
        self.last_save = Some(Instant::now());
    }

    /// True within the window after the last local save.
    pub fn is_echo(&self) -> bool {
        self.last_save
            .is_some_and(|at| at.elapsed() < self.window)
    }
}

/// Polls the store until it is ready, failing after `max_attempts` polls.
pub async fn wait_until_ready(
    store: &dyn TableStore,
    interval: Duration,
    max_attempts: u32,
) -> Result<()> {
    for attempt in 1..=max_attempts {
        if store.is_ready().await {
            if attempt > 1 {
                tracing::debug!(attempt, "Store became ready");
            }
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }
    tracing::error!(attempts = max_attempts, "Store did not become ready");
    Err(Error::InitTimeout {
        attempts: max_attempts,
    })
}
