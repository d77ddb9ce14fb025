// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Column definitions bound to one of the two table views.

use serde::{Deserialize, Serialize};

use crate::parameter::{
    default_optional_parameters, fixed_child_parameters, fixed_parent_parameters,
    ParameterDefinition, ESSENTIAL_FIELDS,
};
use crate::value::ParameterType;

/// The two tables a column can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Parent,
    Child,
}

impl View {
    pub const ALL: [View; 2] = [View::Parent, View::Child];

    pub fn as_str(&self) -> &'static str {
        match self {
            View::Parent => "parent",
            View::Child => "child",
        }
    }

    /// Fixed parameters of this view.
    pub fn fixed_parameters(&self) -> Vec<ParameterDefinition> {
        match self {
            View::Parent => fixed_parent_parameters(),
            View::Child => fixed_child_parameters(),
        }
    }

    /// Columns a freshly created table shows in this view.
    pub fn default_columns(&self) -> Vec<ColumnDef> {
        let mut params = self.fixed_parameters();
        params.extend(default_optional_parameters());
        params
            .iter()
            .enumerate()
            .map(|(i, p)| ColumnDef::from_parameter(p, i))
            .collect()
    }

    /// Minimal column set used for the first, essential-only paint.
    pub fn essential_columns(&self) -> Vec<ColumnDef> {
        self.fixed_parameters()
            .iter()
            .filter(|p| ESSENTIAL_FIELDS.contains(&p.field.as_str()))
            .enumerate()
            .map(|(i, p)| ColumnDef::from_parameter(p, i))
            .collect()
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value per view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerView<T> {
    pub parent: T,
    pub child: T,
}

impl<T> PerView<T> {
    pub fn new(parent: T, child: T) -> Self {
        Self { parent, child }
    }

    pub fn get(&self, view: View) -> &T {
        match view {
            View::Parent => &self.parent,
            View::Child => &self.child,
        }
    }

    pub fn get_mut(&mut self, view: View) -> &mut T {
        match view {
            View::Parent => &mut self.parent,
            View::Child => &mut self.child,
        }
    }
}

/// An active table column.
///
/// `source` and `fetched_group` record where the column came from;
/// `current_group` is where it is displayed now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub field: String,
    pub header: String,
    #[serde(rename = "type", default)]
    pub param_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_fixed: bool,
    pub removable: bool,
    pub visible: bool,
    pub order: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_group: Option<String>,
}

impl ColumnDef {
    /// Builds a visible column from a parameter at the given position.
    ///
    /// Fixed parameters produce non-removable columns.
    pub fn from_parameter(param: &ParameterDefinition, order: usize) -> Self {
        let source = param.group.clone().or_else(|| param.category.clone());
        Self {
            field: param.field.clone(),
            header: param.header.clone(),
            param_type: param.param_type,
            category: param.category.clone(),
            description: param.description.clone(),
            is_fixed: param.is_fixed,
            removable: !param.is_fixed,
            visible: true,
            order,
            fetched_group: param.group.clone(),
            current_group: source.clone(),
            source,
        }
    }

    /// The parameter this column was created from.
    pub fn to_parameter(&self) -> ParameterDefinition {
        ParameterDefinition {
            field: self.field.clone(),
            header: self.header.clone(),
            param_type: self.param_type,
            category: self.category.clone(),
            description: self.description.clone(),
            group: self.fetched_group.clone(),
            frequency: None,
            is_fixed: self.is_fixed,
            removable: self.removable,
            visible: self.visible,
            order: Some(self.order),
        }
    }
}

/// Either an active column or a not-yet-added parameter, e.g. the payload of
/// a drop onto a table header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnItem {
    Column(ColumnDef),
    Parameter(ParameterDefinition),
}

impl ColumnItem {
    pub fn field(&self) -> &str {
        match self {
            ColumnItem::Column(c) => &c.field,
            ColumnItem::Parameter(p) => &p.field,
        }
    }
}
