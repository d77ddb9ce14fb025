// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parameter definitions and the built-in fixed parameter sets.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::value::ParameterType;

/// Category assigned to every discovered parameter.
pub const CUSTOM_PARAMETERS: &str = "Custom Parameters";
/// Category of the built-in parameters.
pub const BASIC_CATEGORY: &str = "Basic";

/// Fields injected into any loaded table that lacks them.
pub const ESSENTIAL_FIELDS: [&str; 2] = ["mark", "category"];

/// A parameter that can become a table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    pub field: String,
    pub header: String,
    #[serde(rename = "type", default)]
    pub param_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Originating group (e.g. "Identity Data").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Share of sampled elements carrying this field (discovered only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    #[serde(default)]
    pub is_fixed: bool,
    #[serde(default = "default_true")]
    pub removable: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl ParameterDefinition {
    /// A discovered, removable parameter.
    pub fn new(field: impl Into<String>, header: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            field: field.into(),
            header: header.into(),
            param_type,
            category: None,
            description: None,
            group: None,
            frequency: None,
            is_fixed: false,
            removable: true,
            visible: true,
            order: None,
        }
    }

    /// A built-in parameter that can never be removed.
    pub fn fixed(field: &str, header: &str, param_type: ParameterType) -> Self {
        Self {
            category: Some(BASIC_CATEGORY.to_string()),
            is_fixed: true,
            removable: false,
            ..Self::new(field, header, param_type)
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn normalized_field(&self) -> String {
        normalize_field(&self.field)
    }
}

/// Normalises a field name for deduplication: trimmed, inner whitespace
/// collapsed, lowercase.
pub fn normalize_field(field: &str) -> String {
    field
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Fixed parameters of the parent (host) table.
pub fn fixed_parent_parameters() -> Vec<ParameterDefinition> {
    vec![
        ParameterDefinition::fixed("mark", "Mark", ParameterType::String),
        ParameterDefinition::fixed("category", "Category", ParameterType::String),
    ]
}

/// Fixed parameters of the child (hosted) table.
pub fn fixed_child_parameters() -> Vec<ParameterDefinition> {
    vec![
        ParameterDefinition::fixed("mark", "Mark", ParameterType::String),
        ParameterDefinition::fixed("category", "Category", ParameterType::String),
        ParameterDefinition::fixed("host", "Host", ParameterType::String),
    ]
}

/// Removable parameters shown by default in both tables.
pub fn default_optional_parameters() -> Vec<ParameterDefinition> {
    vec![ParameterDefinition::new("type", "Type", ParameterType::String)
        .with_category(BASIC_CATEGORY)]
}

/// Merges discovered parameters into a fixed baseline.
///
/// Fixed parameters come first and win over discovered ones with the same
/// normalised field. Later duplicates among the discovered list are dropped.
pub fn merge_parameters(
    fixed: &[ParameterDefinition],
    discovered: &[ParameterDefinition],
) -> Vec<ParameterDefinition> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut merged = Vec::with_capacity(fixed.len() + discovered.len());

    for param in fixed.iter().chain(discovered) {
        if seen.insert(param.normalized_field()) {
            merged.push(param.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_parameters_are_not_removable() {
        for p in fixed_parent_parameters().iter().chain(&fixed_child_parameters()) {
            assert!(p.is_fixed);
            assert!(!p.removable);
        }
    }

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_field("  Fire   Rating "), "fire rating");
    }

    #[test]
    fn merge_keeps_fixed_first_and_dedups() {
        let fixed = fixed_parent_parameters();
        let discovered = vec![
            ParameterDefinition::new("Mark", "Mark", ParameterType::String),
            ParameterDefinition::new("Width", "Width", ParameterType::Number),
            ParameterDefinition::new("width ", "width", ParameterType::Number),
        ];
        let merged = merge_parameters(&fixed, &discovered);
        let fields: Vec<_> = merged.iter().map(|p| p.field.as_str()).collect();
        assert_eq!(fields, vec!["mark", "category", "Width"]);
        assert!(merged[0].is_fixed);
    }

    #[test]
    fn deserialize_fills_defaults() {
        let p: ParameterDefinition =
            serde_json::from_str(r#"{"field":"Width","header":"Width","type":"number"}"#).unwrap();
        assert!(p.removable);
        assert!(p.visible);
        assert!(!p.is_fixed);
        assert_eq!(p.param_type, ParameterType::Number);
    }
}
