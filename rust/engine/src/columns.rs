// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Column reconciliation for the parent and child views of one table.
//!
//! Every mutating operation either applies completely or returns an error
//! and leaves the state untouched. After every successful mutation the
//! active columns of the affected view have unique fields and `order`
//! values equal to their positions. Each mutation appends a
//! [`ChangeRecord`] to the pending list and a snapshot to the history.

use bimtable_core::{normalize_field, ColumnDef, ColumnItem, ParameterDefinition, PerView, View};
use rustc_hash::FxHashSet;

use crate::change::{ChangeKind, ChangeRecord};
use crate::config::{CategoryFilters, TableConfig};
use crate::error::{Error, Result};
use crate::grouping::{group_columns, sort_columns, ColumnGroup, SortBy};
use crate::history::{History, DEFAULT_HISTORY_LIMIT};

/// Active columns and known parameters of one view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnView {
    active: Vec<ColumnDef>,
    known: Vec<ParameterDefinition>,
}

impl ColumnView {
    fn new(mut active: Vec<ColumnDef>) -> Self {
        reindex(&mut active);
        Self {
            active,
            known: Vec::new(),
        }
    }

    pub fn active(&self) -> &[ColumnDef] {
        &self.active
    }

    /// Known parameters that are not active.
    pub fn available(&self) -> Vec<&ParameterDefinition> {
        let active: FxHashSet<String> = self.active.iter().map(|c| normalize_field(&c.field)).collect();
        self.known
            .iter()
            .filter(|p| !active.contains(&p.normalized_field()))
            .collect()
    }

    fn position(&self, field: &str) -> Option<usize> {
        self.active.iter().position(|c| c.field == field)
    }
}

/// Snapshot handed to the persistence collaborator by [`TableColumns::save_changes`].
#[derive(Debug, Clone, PartialEq)]
pub struct SavedColumns {
    pub parent_columns: Vec<ColumnDef>,
    pub child_columns: Vec<ColumnDef>,
    pub category_filters: CategoryFilters,
}

/// In-memory working copy of a table's columns.
#[derive(Debug, Clone)]
pub struct TableColumns {
    views: PerView<ColumnView>,
    filters: CategoryFilters,
    pending: Vec<ChangeRecord>,
    history: History,
}

impl Default for TableColumns {
    fn default() -> Self {
        Self::new(
            PerView::new(View::Parent.default_columns(), View::Child.default_columns()),
            CategoryFilters::default(),
            DEFAULT_HISTORY_LIMIT,
        )
    }
}

impl TableColumns {
    pub fn new(columns: PerView<Vec<ColumnDef>>, filters: CategoryFilters, history_limit: usize) -> Self {
        let views = PerView::new(ColumnView::new(columns.parent), ColumnView::new(columns.child));
        let history = History::new(
            PerView::new(views.parent.active.clone(), views.child.active.clone()),
            filters.clone(),
            history_limit,
        );
        Self {
            views,
            filters,
            pending: Vec::new(),
            history,
        }
    }

    pub fn from_config(config: &TableConfig, history_limit: usize) -> Self {
        Self::new(config.per_view(), config.category_filters.clone(), history_limit)
    }

    pub fn columns(&self, view: View) -> &[ColumnDef] {
        &self.views.get(view).active
    }

    pub fn view(&self, view: View) -> &ColumnView {
        self.views.get(view)
    }

    pub fn category_filters(&self) -> &CategoryFilters {
        &self.filters
    }

    pub fn pending(&self) -> &[ChangeRecord] {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Replaces the parameters known for a view, e.g. after a pipeline pass.
    pub fn set_known_parameters(&mut self, view: View, params: Vec<ParameterDefinition>) {
        self.views.get_mut(view).known = params;
    }

    pub fn available(&self, view: View) -> Vec<&ParameterDefinition> {
        self.views.get(view).available()
    }

    pub fn grouped(&self, view: View) -> Vec<ColumnGroup> {
        group_columns(self.columns(view))
    }

    pub fn sorted(&self, view: View, by: SortBy) -> Vec<ColumnDef> {
        sort_columns(self.columns(view), by)
    }

    /// Appends a column built from the parameter.
    pub fn add(&mut self, view: View, param: &ParameterDefinition) -> Result<()> {
        let len = self.columns(view).len();
        self.insert_at(view, param, len)
    }

    /// Removes a removable column and reindexes the rest.
    pub fn remove(&mut self, view: View, field: &str) -> Result<ColumnDef> {
        let target = self.views.get(view);
        let Some(pos) = target.position(field) else {
            return Err(rejected(Error::ColumnNotFound {
                view,
                field: field.to_string(),
            }));
        };
        if !target.active[pos].removable {
            return Err(rejected(Error::NotRemovable {
                view,
                field: field.to_string(),
            }));
        }

        let previous = target.active.clone();
        let active = &mut self.views.get_mut(view).active;
        let removed = active.remove(pos);
        reindex(active);

        self.changed(
            ChangeRecord::new(ChangeKind::Remove, Some(view))
                .with_column(removed.clone())
                .with_previous(previous),
        );
        Ok(removed)
    }

    /// Moves the column at `from` to `to`.
    ///
    /// Requires `0 <= from < n` and `0 <= to <= n`; the column is taken
    /// out first and reinserted at `to`, clamped to the shortened list.
    pub fn reorder(&mut self, view: View, from: isize, to: isize) -> Result<()> {
        let len = self.columns(view).len();
        let valid = from >= 0 && (from as usize) < len && to >= 0 && (to as usize) <= len;
        if !valid {
            return Err(rejected(Error::InvalidReorder { view, from, to, len }));
        }
        let (from, to) = (from as usize, to as usize);

        let previous = self.columns(view).to_vec();
        let active = &mut self.views.get_mut(view).active;
        let moved = active.remove(from);
        let to = to.min(active.len());
        active.insert(to, moved);
        reindex(active);
        let column = active[to].clone();

        self.changed(
            ChangeRecord::new(ChangeKind::Reorder, Some(view))
                .with_column(column)
                .with_previous(previous),
        );
        Ok(())
    }

    /// Shows or hides a column. Order is unchanged; setting the current
    /// value records nothing.
    pub fn set_visibility(&mut self, view: View, field: &str, visible: bool) -> Result<()> {
        let Some(pos) = self.views.get(view).position(field) else {
            return Err(rejected(Error::ColumnNotFound {
                view,
                field: field.to_string(),
            }));
        };
        if self.columns(view)[pos].visible == visible {
            return Ok(());
        }

        let previous = self.columns(view).to_vec();
        let column = &mut self.views.get_mut(view).active[pos];
        column.visible = visible;
        let column = column.clone();

        self.changed(
            ChangeRecord::new(ChangeKind::Visibility, Some(view))
                .with_column(column)
                .with_previous(previous),
        );
        Ok(())
    }

    /// Handles a drop onto position `index`: a parameter is added there, an
    /// active column is moved there. `index` past the end means the end.
    pub fn drop_item(&mut self, view: View, item: &ColumnItem, index: usize) -> Result<()> {
        match item {
            ColumnItem::Parameter(param) => {
                let at = index.min(self.columns(view).len());
                self.insert_at(view, param, at)
            }
            ColumnItem::Column(col) => {
                let Some(from) = self.views.get(view).position(&col.field) else {
                    return Err(rejected(Error::ColumnNotFound {
                        view,
                        field: col.field.clone(),
                    }));
                };
                let len = self.columns(view).len();
                self.reorder(view, from as isize, index.min(len) as isize)
            }
        }
    }

    pub fn set_category_filters(&mut self, filters: CategoryFilters) {
        if filters == self.filters {
            return;
        }
        self.filters = filters;
        self.changed(ChangeRecord::new(ChangeKind::Filters, None));
    }

    /// Stamps every column's order with its position, clears pending
    /// changes and returns the columns to persist. A second call without
    /// intervening mutation returns the same snapshot.
    pub fn save_changes(&mut self) -> SavedColumns {
        for view in View::ALL {
            reindex(&mut self.views.get_mut(view).active);
        }
        if !self.pending.is_empty() {
            tracing::debug!(changes = self.pending.len(), "Saving column changes");
        }
        self.pending.clear();
        self.snapshot()
    }

    pub fn snapshot(&self) -> SavedColumns {
        SavedColumns {
            parent_columns: self.views.parent.active.clone(),
            child_columns: self.views.child.active.clone(),
            category_filters: self.filters.clone(),
        }
    }

    /// Settles a successful write. The first `settled` pending changes are
    /// dropped and the columns become the ones the store answered with;
    /// a repaired answer amends the current history entry rather than
    /// adding an undo step.
    pub fn adopt_saved(&mut self, config: &TableConfig, settled: usize) {
        self.pending.drain(..settled.min(self.pending.len()));
        let columns = config.per_view();
        if columns == self.active_columns() && config.category_filters == self.filters {
            return;
        }
        tracing::debug!(table_id = %config.id, "Adopting repaired columns from store");
        self.views.parent.active = columns.parent;
        self.views.child.active = columns.child;
        for view in View::ALL {
            reindex(&mut self.views.get_mut(view).active);
        }
        self.filters = config.category_filters.clone();
        self.history.amend(self.active_columns(), self.filters.clone());
    }

    pub fn undo(&mut self) -> Result<()> {
        let snapshot = match self.history.undo() {
            Some(s) => s.clone(),
            None => return Err(rejected(Error::NothingToUndo)),
        };
        self.restore(snapshot.columns, snapshot.category_filters);
        Ok(())
    }

    pub fn redo(&mut self) -> Result<()> {
        let snapshot = match self.history.redo() {
            Some(s) => s.clone(),
            None => return Err(rejected(Error::NothingToRedo)),
        };
        self.restore(snapshot.columns, snapshot.category_filters);
        Ok(())
    }

    /// Replaces all state with a remote config. Returns how many pending
    /// changes were discarded. Known parameters are kept.
    pub fn replace(&mut self, config: &TableConfig) -> usize {
        let discarded = self.pending.len();
        let columns = config.per_view();
        self.views.parent.active = columns.parent;
        self.views.child.active = columns.child;
        for view in View::ALL {
            reindex(&mut self.views.get_mut(view).active);
        }
        self.filters = config.category_filters.clone();
        self.pending.clear();
        self.history.reset(self.active_columns(), self.filters.clone());
        discarded
    }

    fn insert_at(&mut self, view: View, param: &ParameterDefinition, at: usize) -> Result<()> {
        if self.views.get(view).position(&param.field).is_some() {
            return Err(rejected(Error::DuplicateColumn {
                view,
                field: param.field.clone(),
            }));
        }

        let previous = self.columns(view).to_vec();
        let active = &mut self.views.get_mut(view).active;
        let at = at.min(active.len());
        active.insert(at, ColumnDef::from_parameter(param, at));
        reindex(active);
        let column = active[at].clone();

        self.changed(
            ChangeRecord::new(ChangeKind::Add, Some(view))
                .with_column(column)
                .with_previous(previous),
        );
        Ok(())
    }

    fn restore(&mut self, columns: PerView<Vec<ColumnDef>>, filters: CategoryFilters) {
        self.views.parent.active = columns.parent;
        self.views.child.active = columns.child;
        self.filters = filters;
        self.pending.push(ChangeRecord::new(ChangeKind::Restore, None));
    }

    fn active_columns(&self) -> PerView<Vec<ColumnDef>> {
        PerView::new(self.views.parent.active.clone(), self.views.child.active.clone())
    }

    fn changed(&mut self, record: ChangeRecord) {
        tracing::debug!(kind = ?record.kind, view = ?record.view, "Column change");
        self.pending.push(record);
        self.history.record(self.active_columns(), self.filters.clone());
    }
}

fn reindex(columns: &mut [ColumnDef]) {
    for (i, col) in columns.iter_mut().enumerate() {
        col.order = i;
    }
}

fn rejected(error: Error) -> Error {
    tracing::warn!(error = %error, "Rejected column operation");
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimtable_core::ParameterType;

    fn param(field: &str) -> ParameterDefinition {
        ParameterDefinition::new(field, field, ParameterType::String)
    }

    fn fields(cols: &[ColumnDef]) -> Vec<&str> {
        cols.iter().map(|c| c.field.as_str()).collect()
    }

    fn orders(cols: &[ColumnDef]) -> Vec<usize> {
        cols.iter().map(|c| c.order).collect()
    }

    /// Parent view holding only removable columns A, B, C.
    fn abc() -> TableColumns {
        let cols = ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, f)| ColumnDef::from_parameter(&param(f), i))
            .collect();
        TableColumns::new(PerView::new(cols, Vec::new()), CategoryFilters::default(), 50)
    }

    #[test]
    fn add_appends_and_rejects_duplicates() {
        let mut t = TableColumns::default();
        t.add(View::Parent, &param("Width")).unwrap();
        assert_eq!(fields(t.columns(View::Parent)), vec!["mark", "category", "type", "Width"]);
        assert_eq!(t.columns(View::Parent)[3].order, 3);
        assert!(t.columns(View::Parent)[3].removable);
        assert!(t.columns(View::Parent)[3].visible);

        let err = t.add(View::Parent, &param("Width")).unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn { .. }));
        assert_eq!(t.columns(View::Parent).len(), 4);
        assert_eq!(t.pending().len(), 1);
        assert_eq!(t.pending()[0].kind, ChangeKind::Add);
    }

    #[test]
    fn remove_reindexes() {
        let mut t = abc();
        t.remove(View::Parent, "A").unwrap();
        assert_eq!(fields(t.columns(View::Parent)), vec!["B", "C"]);
        assert_eq!(orders(t.columns(View::Parent)), vec![0, 1]);
    }

    #[test]
    fn fixed_columns_cannot_be_removed() {
        let mut t = TableColumns::default();
        let before = t.columns(View::Child).to_vec();
        let err = t.remove(View::Child, "host").unwrap_err();
        assert!(matches!(err, Error::NotRemovable { .. }));
        assert_eq!(t.columns(View::Child), &before[..]);
        assert!(!t.has_pending());
    }

    #[test]
    fn reorder_bounds() {
        let mut t = abc();
        assert!(t.reorder(View::Parent, -1, 0).is_err());
        assert!(t.reorder(View::Parent, 0, 999).is_err());
        assert_eq!(fields(t.columns(View::Parent)), vec!["A", "B", "C"]);

        t.reorder(View::Parent, 0, 2).unwrap();
        assert_eq!(fields(t.columns(View::Parent)), vec!["B", "C", "A"]);
        assert_eq!(orders(t.columns(View::Parent)), vec![0, 1, 2]);

        // to == n is accepted and lands at the end
        t.reorder(View::Parent, 0, 3).unwrap();
        assert_eq!(fields(t.columns(View::Parent)), vec!["C", "A", "B"]);
    }

    #[test]
    fn visibility_keeps_order() {
        let mut t = abc();
        t.set_visibility(View::Parent, "B", false).unwrap();
        assert!(!t.columns(View::Parent)[1].visible);
        assert_eq!(orders(t.columns(View::Parent)), vec![0, 1, 2]);
        t.set_visibility(View::Parent, "B", false).unwrap();
        assert_eq!(t.pending().len(), 1);
        assert!(t.set_visibility(View::Parent, "Z", true).is_err());
    }

    #[test]
    fn save_is_idempotent() {
        let mut t = abc();
        t.add(View::Child, &param("Height")).unwrap();
        let first = t.save_changes();
        assert!(!t.has_pending());
        let second = t.save_changes();
        assert_eq!(first, second);
        assert!(!t.has_pending());
    }

    #[test]
    fn undo_redo_and_truncation() {
        let mut t = abc();
        t.remove(View::Parent, "C").unwrap();
        t.reorder(View::Parent, 1, 0).unwrap();
        assert_eq!(fields(t.columns(View::Parent)), vec!["B", "A"]);

        t.undo().unwrap();
        assert_eq!(fields(t.columns(View::Parent)), vec!["A", "B"]);
        t.undo().unwrap();
        assert_eq!(fields(t.columns(View::Parent)), vec!["A", "B", "C"]);
        assert!(matches!(t.undo(), Err(Error::NothingToUndo)));

        t.redo().unwrap();
        assert_eq!(fields(t.columns(View::Parent)), vec!["A", "B"]);

        t.add(View::Parent, &param("D")).unwrap();
        assert!(!t.can_redo());
        assert!(matches!(t.redo(), Err(Error::NothingToRedo)));
        assert_eq!(t.pending().last().unwrap().kind, ChangeKind::Add);
    }

    #[test]
    fn drop_parameter_and_column() {
        let mut t = abc();
        t.drop_item(View::Parent, &ColumnItem::Parameter(param("X")), 1).unwrap();
        assert_eq!(fields(t.columns(View::Parent)), vec!["A", "X", "B", "C"]);

        let c = t.columns(View::Parent)[3].clone();
        t.drop_item(View::Parent, &ColumnItem::Column(c), 0).unwrap();
        assert_eq!(fields(t.columns(View::Parent)), vec!["C", "A", "X", "B"]);
        assert_eq!(orders(t.columns(View::Parent)), vec![0, 1, 2, 3]);

        t.drop_item(View::Parent, &ColumnItem::Parameter(param("Y")), 99).unwrap();
        assert_eq!(t.columns(View::Parent).last().unwrap().field, "Y");
    }

    #[test]
    fn available_excludes_active() {
        let mut t = abc();
        t.set_known_parameters(View::Parent, vec![param("a"), param("Width")]);
        let available: Vec<_> = t.available(View::Parent).into_iter().map(|p| p.field.clone()).collect();
        assert_eq!(available, vec!["Width"]);
        assert!(t.available(View::Child).is_empty());
    }

    #[test]
    fn filters_are_tracked() {
        let mut t = abc();
        t.set_category_filters(CategoryFilters {
            selected_parent_categories: vec!["Walls".into()],
            selected_child_categories: Vec::new(),
        });
        assert_eq!(t.pending()[0].kind, ChangeKind::Filters);
        t.undo().unwrap();
        assert!(t.category_filters().selected_parent_categories.is_empty());
    }

    #[test]
    fn adopt_saved_settles_only_written_changes() {
        let mut t = abc();
        t.add(View::Parent, &param("D")).unwrap();
        let written = t.pending().len();
        t.remove(View::Parent, "A").unwrap();

        let mut stored = TableConfig::new("t", "stored");
        let local = t.snapshot();
        stored.parent_columns = local.parent_columns;
        stored.child_columns = local.child_columns;
        t.adopt_saved(&stored, written);
        let kinds: Vec<_> = t.pending().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Remove]);
        assert_eq!(fields(t.columns(View::Parent)), vec!["B", "C", "D"]);
    }

    #[test]
    fn adopt_saved_takes_repaired_columns() {
        let mut t = abc();
        t.add(View::Parent, &param("D")).unwrap();
        let repaired = TableConfig::new("t", "stored");
        t.adopt_saved(&repaired, 1);
        assert!(!t.has_pending());
        assert_eq!(t.columns(View::Parent), &repaired.parent_columns[..]);
        t.undo().unwrap();
        assert_eq!(fields(t.columns(View::Parent)), vec!["A", "B", "C"]);
    }

    #[test]
    fn replace_reports_discarded() {
        let mut t = abc();
        t.add(View::Parent, &param("D")).unwrap();
        let remote = TableConfig::new("t", "remote");
        assert_eq!(t.replace(&remote), 1);
        assert_eq!(t.columns(View::Parent), &remote.parent_columns[..]);
        assert!(!t.can_undo());
    }
}
