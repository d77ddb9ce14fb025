// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persisted table configuration and its boundary decoder.
//!
//! [`TableConfig::decode`] is the single place untyped stored JSON becomes a
//! typed config. Shapes that can be repaired are repaired (and logged);
//! only a config without a usable id is rejected.

use bimtable_core::{ColumnDef, PerView, View, ESSENTIAL_FIELDS};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Category selection stored with a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryFilters {
    pub selected_parent_categories: Vec<String>,
    pub selected_child_categories: Vec<String>,
}

/// A named table: columns of both views plus category filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    pub id: String,
    pub name: String,
    pub parent_columns: Vec<ColumnDef>,
    pub child_columns: Vec<ColumnDef>,
    #[serde(default)]
    pub category_filters: CategoryFilters,
    /// Milliseconds since the Unix epoch, stamped by the store.
    #[serde(default)]
    pub last_update_timestamp: i64,
}

/// Partial update sent to a store; absent fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_columns: Option<Vec<ColumnDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_columns: Option<Vec<ColumnDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_filters: Option<CategoryFilters>,
}

impl TableConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.parent_columns.is_none()
            && self.child_columns.is_none()
            && self.category_filters.is_none()
    }

    /// Decodes an incoming patch with the same column leniency as
    /// [`TableConfig::decode`]. Absent or null keys stay unset.
    pub fn decode(value: Value, table_id: &str) -> Result<Self> {
        let Value::Object(mut obj) = value else {
            return Err(Error::InvalidTableConfig("expected an object".into()));
        };

        let name = match obj.remove("name") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                return Err(Error::InvalidTableConfig(format!(
                    "name must be a string, got {}",
                    other
                )))
            }
        };
        let mut columns = |key: &str, view: View| {
            obj.remove(key)
                .filter(|v| !v.is_null())
                .map(|v| decode_columns(view, Some(v), table_id))
        };
        let parent_columns = columns("parentColumns", View::Parent);
        let child_columns = columns("childColumns", View::Child);
        let category_filters = match obj.remove("categoryFilters") {
            None | Some(Value::Null) => None,
            Some(v) => Some(serde_json::from_value(v)?),
        };

        Ok(Self {
            name,
            parent_columns,
            child_columns,
            category_filters,
        })
    }
}

impl TableConfig {
    /// A table with the default columns of both views.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_columns: View::Parent.default_columns(),
            child_columns: View::Child.default_columns(),
            category_filters: CategoryFilters::default(),
            last_update_timestamp: 0,
        }
    }

    pub fn columns(&self, view: View) -> &[ColumnDef] {
        match view {
            View::Parent => &self.parent_columns,
            View::Child => &self.child_columns,
        }
    }

    pub fn per_view(&self) -> PerView<Vec<ColumnDef>> {
        PerView::new(self.parent_columns.clone(), self.child_columns.clone())
    }

    /// Applies a patch; column lists are repaired like decoded ones.
    pub fn apply_patch(&mut self, patch: TableConfigPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(cols) = patch.parent_columns {
            self.parent_columns = repair_columns(View::Parent, cols, &self.id);
        }
        if let Some(cols) = patch.child_columns {
            self.child_columns = repair_columns(View::Child, cols, &self.id);
        }
        if let Some(filters) = patch.category_filters {
            self.category_filters = filters;
        }
    }

    /// Full patch carrying every field of this config.
    pub fn to_patch(&self) -> TableConfigPatch {
        TableConfigPatch {
            name: Some(self.name.clone()),
            parent_columns: Some(self.parent_columns.clone()),
            child_columns: Some(self.child_columns.clone()),
            category_filters: Some(self.category_filters.clone()),
        }
    }

    /// Decodes and repairs a stored config.
    ///
    /// - a missing or empty column array falls back to the view defaults
    /// - entries without a string `field` are dropped
    /// - a non-numeric `order` is replaced by the entry's position
    /// - duplicate fields keep the first occurrence
    /// - missing essential fields are injected at the front
    /// - orders are reindexed densely
    pub fn decode(value: Value) -> Result<Self> {
        let Value::Object(mut obj) = value else {
            return Err(Error::InvalidTableConfig("expected an object".into()));
        };

        let id = match obj.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(Error::InvalidTableConfig("missing table id".into())),
        };
        let name = match obj.get("name").and_then(Value::as_str) {
            Some(n) if !n.trim().is_empty() => n.to_string(),
            _ => {
                tracing::warn!(table_id = %id, "Table has no name, using its id");
                id.clone()
            }
        };

        let parent_columns = decode_columns(View::Parent, obj.remove("parentColumns"), &id);
        let child_columns = decode_columns(View::Child, obj.remove("childColumns"), &id);

        let category_filters = match obj.remove("categoryFilters") {
            None | Some(Value::Null) => CategoryFilters::default(),
            Some(v) => serde_json::from_value(v).unwrap_or_else(|e| {
                tracing::warn!(table_id = %id, error = %e, "Resetting malformed category filters");
                CategoryFilters::default()
            }),
        };
        let last_update_timestamp = obj
            .get("lastUpdateTimestamp")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|t| t as i64)))
            .unwrap_or(0);

        Ok(Self {
            id,
            name,
            parent_columns,
            child_columns,
            category_filters,
            last_update_timestamp,
        })
    }
}

fn decode_columns(view: View, value: Option<Value>, table_id: &str) -> Vec<ColumnDef> {
    let items = match value {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => {
            tracing::warn!(table_id, %view, "Missing column list, using defaults");
            return view.default_columns();
        }
    };

    let columns: Vec<ColumnDef> = items
        .into_iter()
        .enumerate()
        .filter_map(|(position, item)| decode_column(item, position, view, table_id))
        .collect();

    if columns.is_empty() {
        tracing::warn!(table_id, %view, "No usable columns, using defaults");
        return view.default_columns();
    }
    repair_columns(view, columns, table_id)
}

fn decode_column(item: Value, position: usize, view: View, table_id: &str) -> Option<ColumnDef> {
    let Value::Object(mut obj) = item else {
        tracing::warn!(table_id, %view, position, "Dropping non-object column");
        return None;
    };
    let field = match obj.get("field").and_then(Value::as_str) {
        Some(f) if !f.trim().is_empty() => f.to_string(),
        _ => {
            tracing::warn!(table_id, %view, position, "Dropping column without field");
            return None;
        }
    };

    if !obj.get("order").is_some_and(Value::is_number) {
        obj.insert("order".into(), Value::from(position));
    } else if let Some(order) = obj.get("order").and_then(Value::as_f64) {
        // negative or fractional orders are only used for sorting
        obj.insert("order".into(), Value::from(order.max(0.0).round() as u64));
    }
    fill_default(&mut obj, "header", Value::String(field.clone()));
    fill_default(&mut obj, "removable", Value::Bool(true));
    fill_default(&mut obj, "visible", Value::Bool(true));

    match serde_json::from_value::<ColumnDef>(Value::Object(obj)) {
        Ok(col) => Some(col),
        Err(e) => {
            tracing::warn!(table_id, %view, field = %field, error = %e, "Dropping malformed column");
            None
        }
    }
}

fn fill_default(obj: &mut Map<String, Value>, key: &str, value: Value) {
    if !obj.get(key).is_some_and(|v| !v.is_null()) {
        obj.insert(key.to_string(), value);
    }
}

/// Sorts by stored order, dedups, injects essentials and reindexes.
pub(crate) fn repair_columns(view: View, mut columns: Vec<ColumnDef>, table_id: &str) -> Vec<ColumnDef> {
    columns.sort_by_key(|c| c.order);

    let mut seen: FxHashSet<String> = FxHashSet::default();
    columns.retain(|c| {
        let fresh = seen.insert(c.field.clone());
        if !fresh {
            tracing::warn!(table_id, %view, field = %c.field, "Dropping duplicate column");
        }
        fresh
    });

    let fixed = view.fixed_parameters();
    for col in columns.iter_mut() {
        if fixed.iter().any(|p| p.field == col.field) {
            col.is_fixed = true;
            col.removable = false;
        }
    }

    let missing: Vec<ColumnDef> = fixed
        .iter()
        .filter(|p| ESSENTIAL_FIELDS.contains(&p.field.as_str()) && !seen.contains(&p.field))
        .map(|p| ColumnDef::from_parameter(p, 0))
        .collect();
    if !missing.is_empty() {
        tracing::warn!(table_id, %view, injected = missing.len(), "Injecting missing essential columns");
        columns.splice(0..0, missing);
    }

    for (i, col) in columns.iter_mut().enumerate() {
        col.order = i;
    }
    columns
}
