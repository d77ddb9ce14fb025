// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # BIM Table Engine
//!
//! Column reconciliation and persistence for the parent and child views of
//! a named table.
//!
//! - [`TableColumns`]: add/remove/reorder/visibility with dense ordering,
//!   pending change tracking and linear undo/redo
//! - [`TableConfig`]: the persisted unit, decoded and repaired at the
//!   boundary
//! - [`TableStore`]: the persistence collaborator, with in-memory and HTTP
//!   implementations
//! - [`TableSession`]: one open table bound to a store, with single-flight
//!   saves and an anti-echo window for remote pushes
//!
//! ```rust,ignore
//! use bimtable_engine::{MemoryTableStore, SessionOptions, TableSession, UpdateQueue};
//! use bimtable_core::View;
//!
//! let store = Arc::new(MemoryTableStore::new());
//! let mut session = TableSession::open(store, UpdateQueue::new(), "walls", SessionOptions::default()).await?;
//! session.columns_mut().reorder(View::Parent, 0, 2)?;
//! session.save().await?;
//! ```

pub mod change;
pub mod columns;
pub mod config;
pub mod error;
pub mod grouping;
pub mod history;
pub mod http;
pub mod persistence;
pub mod session;

pub use change::{ChangeKind, ChangeRecord};
pub use columns::{ColumnView, SavedColumns, TableColumns};
pub use config::{CategoryFilters, TableConfig, TableConfigPatch};
pub use error::{Error, Result};
pub use grouping::{group_columns, sort_columns, ColumnGroup, SortBy};
pub use history::{History, Snapshot, DEFAULT_HISTORY_LIMIT};
pub use http::HttpTableStore;
pub use persistence::{
    now_millis, wait_until_ready, EchoGuard, MemoryTableStore, TableStore, UpdateQueue,
};
pub use session::{RemoteUpdate, SessionOptions, TableSession};
