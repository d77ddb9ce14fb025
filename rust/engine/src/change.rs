// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pending change records.

use bimtable_core::{ColumnDef, View};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Add,
    Remove,
    Reorder,
    Visibility,
    /// Columns replaced wholesale by undo or redo.
    Restore,
    /// Category filter selection edited.
    Filters,
}

/// One local edit not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Absent for changes spanning both views.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<View>,
    #[serde(rename = "columnDef", default, skip_serializing_if = "Option::is_none")]
    pub column: Option<ColumnDef>,
    /// Columns of the view before the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<Vec<ColumnDef>>,
    pub timestamp: DateTime<Utc>,
}

impl ChangeRecord {
    pub fn new(kind: ChangeKind, view: Option<View>) -> Self {
        Self {
            kind,
            view,
            column: None,
            previous_state: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.column = Some(column);
        self
    }

    pub fn with_previous(mut self, previous: Vec<ColumnDef>) -> Self {
        self.previous_state = Some(previous);
        self
    }
}
