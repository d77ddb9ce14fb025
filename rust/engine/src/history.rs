// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Linear undo/redo history of column snapshots.

use std::collections::VecDeque;

use bimtable_core::{ColumnDef, PerView};
use chrono::{DateTime, Utc};

use crate::config::CategoryFilters;

/// Default number of snapshots kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Immutable state of a table at one point in its history.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub columns: PerView<Vec<ColumnDef>>,
    pub category_filters: CategoryFilters,
}

/// Snapshots with a cursor. Recording while the cursor is behind the tip
/// discards the redo branch; the oldest snapshot is dropped past the limit.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Snapshot>,
    cursor: usize,
    limit: usize,
    next_id: u64,
}

impl History {
    pub fn new(columns: PerView<Vec<ColumnDef>>, category_filters: CategoryFilters, limit: usize) -> Self {
        let mut history = Self {
            entries: VecDeque::new(),
            cursor: 0,
            limit: limit.max(1),
            next_id: 0,
        };
        history.reset(columns, category_filters);
        history
    }

    /// Drops all history and starts again from the given state.
    pub fn reset(&mut self, columns: PerView<Vec<ColumnDef>>, category_filters: CategoryFilters) {
        self.entries.clear();
        self.cursor = 0;
        let snapshot = self.snapshot(columns, category_filters);
        self.entries.push_back(snapshot);
    }

    pub fn record(&mut self, columns: PerView<Vec<ColumnDef>>, category_filters: CategoryFilters) {
        self.entries.truncate(self.cursor + 1);
        let snapshot = self.snapshot(columns, category_filters);
        self.entries.push_back(snapshot);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Rewrites the snapshot under the cursor in place.
    pub fn amend(&mut self, columns: PerView<Vec<ColumnDef>>, category_filters: CategoryFilters) {
        let snapshot = self.snapshot(columns, category_filters);
        match self.entries.get_mut(self.cursor) {
            Some(entry) => *entry = snapshot,
            None => self.entries.push_back(snapshot),
        }
    }

    pub fn undo(&mut self) -> Option<&Snapshot> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    pub fn redo(&mut self) -> Option<&Snapshot> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.entries.get(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn snapshot(&mut self, columns: PerView<Vec<ColumnDef>>, category_filters: CategoryFilters) -> Snapshot {
        let id = self.next_id;
        self.next_id += 1;
        Snapshot {
            id,
            timestamp: Utc::now(),
            columns,
            category_filters,
        }
    }
}
