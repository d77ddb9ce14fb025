// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One open table: working columns bound to a store.
//!
//! Sessions are constructed explicitly by the caller; several sessions for
//! different tables can share one store and one [`UpdateQueue`].

use std::sync::Arc;
use std::time::Duration;

use bimtable_core::{ColumnDef, ParameterDefinition, PerView, View};

use crate::columns::TableColumns;
use crate::config::{CategoryFilters, TableConfig, TableConfigPatch};
use crate::error::{Error, Result};
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::persistence::{wait_until_ready, EchoGuard, TableStore, UpdateQueue};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Remote updates within this long after a local save are ignored.
    pub echo_window: Duration,
    pub ready_poll_interval: Duration,
    pub ready_max_attempts: u32,
    pub history_limit: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            echo_window: Duration::from_millis(500),
            ready_poll_interval: Duration::from_millis(100),
            ready_max_attempts: 50,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Outcome of [`TableSession::apply_remote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteUpdate {
    /// Arrived inside the echo window of our own save.
    IgnoredEcho,
    /// Replaced local state; unsaved local changes were dropped.
    Applied { discarded_pending: usize },
}

pub struct TableSession {
    store: Arc<dyn TableStore>,
    queue: UpdateQueue,
    echo: EchoGuard,
    options: SessionOptions,
    id: String,
    name: String,
    renamed: bool,
    last_update_timestamp: i64,
    columns: TableColumns,
}

impl std::fmt::Debug for TableSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pending", &self.columns.pending().len())
            .finish_non_exhaustive()
    }
}

impl TableSession {
    /// Waits for the store, then loads the table.
    pub async fn open(
        store: Arc<dyn TableStore>,
        queue: UpdateQueue,
        id: &str,
        options: SessionOptions,
    ) -> Result<Self> {
        wait_until_ready(store.as_ref(), options.ready_poll_interval, options.ready_max_attempts).await?;
        let config = store.fetch(id).await?;
        tracing::info!(table_id = %config.id, name = %config.name, "Opened table");
        Ok(Self::from_config(store, queue, config, options))
    }

    /// Saves the given columns as a new table under a fresh id.
    pub async fn create(
        store: Arc<dyn TableStore>,
        queue: UpdateQueue,
        name: &str,
        columns: PerView<Vec<ColumnDef>>,
        filters: CategoryFilters,
        options: SessionOptions,
    ) -> Result<Self> {
        wait_until_ready(store.as_ref(), options.ready_poll_interval, options.ready_max_attempts).await?;
        let id = uuid::Uuid::new_v4().to_string();
        let patch = TableConfigPatch {
            name: Some(name.to_string()),
            parent_columns: Some(columns.parent),
            child_columns: Some(columns.child),
            category_filters: Some(filters),
        };

        let config = {
            let store = Arc::clone(&store);
            let id = id.clone();
            queue.submit(async move { store.save(&id, patch).await }).await?
        };
        tracing::info!(table_id = %config.id, name = %config.name, "Created table");

        let mut session = Self::from_config(store, queue, config, options);
        session.echo.mark_saved();
        Ok(session)
    }

    fn from_config(
        store: Arc<dyn TableStore>,
        queue: UpdateQueue,
        config: TableConfig,
        options: SessionOptions,
    ) -> Self {
        Self {
            columns: TableColumns::from_config(&config, options.history_limit),
            echo: EchoGuard::new(options.echo_window),
            store,
            queue,
            options,
            id: config.id,
            name: config.name,
            renamed: false,
            last_update_timestamp: config.last_update_timestamp,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn last_update_timestamp(&self) -> i64 {
        self.last_update_timestamp
    }

    pub fn columns(&self) -> &TableColumns {
        &self.columns
    }

    /// Column operations go through here; nothing else mutates the state.
    pub fn columns_mut(&mut self) -> &mut TableColumns {
        &mut self.columns
    }

    /// Feeds the parameters a pipeline pass found for each view.
    pub fn set_known_parameters(&mut self, headers: PerView<Vec<ParameterDefinition>>) {
        self.columns.set_known_parameters(View::Parent, headers.parent);
        self.columns.set_known_parameters(View::Child, headers.child);
    }

    /// The working copy as a config.
    pub fn config(&self) -> TableConfig {
        let saved = self.columns.snapshot();
        TableConfig {
            id: self.id.clone(),
            name: self.name.clone(),
            parent_columns: saved.parent_columns,
            child_columns: saved.child_columns,
            category_filters: saved.category_filters,
            last_update_timestamp: self.last_update_timestamp,
        }
    }

    pub fn rename(&mut self, name: &str) {
        if self.name != name {
            self.name = name.to_string();
            self.renamed = true;
        }
    }

    /// Persists the working copy through the update queue.
    ///
    /// Without pending changes (and without a rename) this returns the
    /// working copy and writes nothing. Pending changes are only settled
    /// once the store has answered, so a failed or abandoned save leaves
    /// the edits marked unsaved. The answer, repaired by the store, becomes
    /// the working copy.
    pub async fn save(&mut self) -> Result<TableConfig> {
        if !self.columns.has_pending() && !self.renamed {
            tracing::debug!(table_id = %self.id, "Nothing to save");
            return Ok(self.config());
        }

        let written = self.columns.pending().len();
        let saved = self.columns.snapshot();
        let patch = TableConfigPatch {
            name: Some(self.name.clone()),
            parent_columns: Some(saved.parent_columns),
            child_columns: Some(saved.child_columns),
            category_filters: Some(saved.category_filters),
        };

        let store = Arc::clone(&self.store);
        let id = self.id.clone();
        let result = self
            .queue
            .submit(async move { store.save(&id, patch).await })
            .await;

        match result {
            Ok(config) => {
                self.echo.mark_saved();
                self.columns.adopt_saved(&config, written);
                self.name = config.name.clone();
                self.renamed = false;
                self.last_update_timestamp = config.last_update_timestamp;
                tracing::info!(table_id = %self.id, changes = written, "Saved table");
                Ok(config)
            }
            Err(e) => {
                tracing::error!(table_id = %self.id, error = %e, "Failed to save table, keeping local changes");
                Err(e)
            }
        }
    }

    /// Applies a remote push. Inside the echo window it is ignored;
    /// otherwise it replaces local state wholesale.
    pub fn apply_remote(&mut self, remote: TableConfig) -> Result<RemoteUpdate> {
        if remote.id != self.id {
            return Err(Error::InvalidTableConfig(format!(
                "update for table {} applied to session of {}",
                remote.id, self.id
            )));
        }
        if self.echo.is_echo() {
            tracing::debug!(table_id = %self.id, "Ignoring echo of local save");
            return Ok(RemoteUpdate::IgnoredEcho);
        }

        let discarded = self.columns.replace(&remote);
        if discarded > 0 {
            tracing::warn!(table_id = %self.id, discarded, "Remote update replaced unsaved local changes");
        }
        self.name = remote.name;
        self.renamed = false;
        self.last_update_timestamp = remote.last_update_timestamp;
        Ok(RemoteUpdate::Applied {
            discarded_pending: discarded,
        })
    }

    /// Fetches the stored table and applies it like a remote push.
    pub async fn refresh(&mut self) -> Result<RemoteUpdate> {
        let remote = self.store.fetch(&self.id).await?;
        self.apply_remote(remote)
    }

    /// Deletes the table from the store.
    pub async fn delete(self) -> Result<()> {
        let store = Arc::clone(&self.store);
        let id = self.id.clone();
        self.queue
            .submit(async move { store.delete(&id).await })
            .await?;
        tracing::info!(table_id = %self.id, "Deleted table");
        Ok(())
    }
}
