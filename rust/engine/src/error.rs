// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for column reconciliation and persistence.

use bimtable_core::View;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by column operations, sessions and table stores.
///
/// Column operation errors leave the column state unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("column {field} is already active in the {view} view")]
    DuplicateColumn { view: View, field: String },

    #[error("column {field} is not active in the {view} view")]
    ColumnNotFound { view: View, field: String },

    #[error("column {field} in the {view} view cannot be removed")]
    NotRemovable { view: View, field: String },

    #[error("cannot move column {from} to {to} in the {view} view ({len} columns)")]
    InvalidReorder {
        view: View,
        from: isize,
        to: isize,
        len: usize,
    },

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    /// A persisted table could not be decoded even after repair.
    #[error("invalid table config: {0}")]
    InvalidTableConfig(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The persistence collaborator failed; local edits are kept.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// The store did not become ready within the poll budget.
    #[error("store not ready after {attempts} attempts")]
    InitTimeout { attempts: u32 },

    #[error(transparent)]
    Core(#[from] bimtable_core::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidTableConfig(e.to_string())
    }
}
