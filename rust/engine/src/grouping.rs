// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-only grouped and sorted views over columns.

use std::cmp::Ordering;

use bimtable_core::parameter::BASIC_CATEGORY;
use bimtable_core::ColumnDef;
use serde::{Deserialize, Serialize};

pub const UNGROUPED: &str = "Ungrouped";

/// Groups listed before all others, in this order.
pub const ESSENTIAL_GROUPS: [&str; 2] = [BASIC_CATEGORY, "Identity Data"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnGroup {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    Name,
    Category,
    Type,
    FixedFirst,
    Group,
}

/// Display group of a column: its source, then its category.
pub fn group_name(column: &ColumnDef) -> &str {
    column
        .source
        .as_deref()
        .or(column.category.as_deref())
        .filter(|g| !g.trim().is_empty())
        .unwrap_or(UNGROUPED)
}

fn group_rank(name: &str) -> usize {
    ESSENTIAL_GROUPS
        .iter()
        .position(|g| *g == name)
        .unwrap_or(ESSENTIAL_GROUPS.len())
}

fn compare_groups(a: &str, b: &str) -> Ordering {
    group_rank(a)
        .cmp(&group_rank(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
}

/// Groups columns, essential groups first and the rest alphabetically.
/// Columns keep their relative order inside a group.
pub fn group_columns(columns: &[ColumnDef]) -> Vec<ColumnGroup> {
    let mut groups: Vec<ColumnGroup> = Vec::new();
    for col in columns {
        let name = group_name(col);
        match groups.iter_mut().find(|g| g.name == name) {
            Some(g) => g.columns.push(col.clone()),
            None => groups.push(ColumnGroup {
                name: name.to_string(),
                columns: vec![col.clone()],
            }),
        }
    }
    groups.sort_by(|a, b| compare_groups(&a.name, &b.name));
    groups
}

/// Stable sort of a copy of the columns.
pub fn sort_columns(columns: &[ColumnDef], by: SortBy) -> Vec<ColumnDef> {
    let header = |c: &ColumnDef| c.header.to_lowercase();
    let mut out = columns.to_vec();
    match by {
        SortBy::Name => out.sort_by_key(header),
        SortBy::Category => out.sort_by(|a, b| {
            a.category
                .as_deref()
                .unwrap_or("")
                .cmp(b.category.as_deref().unwrap_or(""))
                .then_with(|| header(a).cmp(&header(b)))
        }),
        SortBy::Type => out.sort_by(|a, b| {
            a.param_type
                .as_str()
                .cmp(b.param_type.as_str())
                .then_with(|| header(a).cmp(&header(b)))
        }),
        SortBy::FixedFirst => out.sort_by_key(|c| (!c.is_fixed, c.order)),
        SortBy::Group => out.sort_by(|a, b| {
            compare_groups(group_name(a), group_name(b)).then_with(|| header(a).cmp(&header(b)))
        }),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimtable_core::{ParameterDefinition, ParameterType, View};

    fn col(field: &str, group: Option<&str>, order: usize) -> ColumnDef {
        let mut p = ParameterDefinition::new(field, field, ParameterType::String);
        if let Some(g) = group {
            p = p.with_group(g);
        }
        ColumnDef::from_parameter(&p, order)
    }

    #[test]
    fn essential_groups_lead() {
        let cols = vec![
            col("Width", Some("Dimensions"), 0),
            col("Comments", Some("Identity Data"), 1),
            col("Free", None, 2),
            col("Area", Some("analysis"), 3),
            col("mark", Some(BASIC_CATEGORY), 4),
        ];
        let names: Vec<_> = group_columns(&cols).into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["Basic", "Identity Data", "analysis", "Dimensions", "Ungrouped"]);
    }

    #[test]
    fn category_is_the_fallback_group() {
        let p = ParameterDefinition::new("x", "x", ParameterType::Number).with_category("Custom Parameters");
        let mut c = ColumnDef::from_parameter(&p, 0);
        c.source = None;
        assert_eq!(group_name(&c), "Custom Parameters");
    }

    #[test]
    fn fixed_first_keeps_order_within_ranks() {
        let mut cols = View::Parent.default_columns();
        cols.push(col("Width", None, 3));
        cols.rotate_left(1);
        let sorted = sort_columns(&cols, SortBy::FixedFirst);
        let fields: Vec<_> = sorted.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["mark", "category", "type", "Width"]);
    }

    #[test]
    fn name_sort_ignores_case() {
        let cols = vec![col("b", None, 0), col("A", None, 1), col("c", None, 2)];
        let sorted = sort_columns(&cols, SortBy::Name);
        let fields: Vec<_> = sorted.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["A", "b", "c"]);
    }
}
