// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One sequential pass from a raw model tree to table rows and columns.
//!
//! ```text
//! raw tree ─► flatten ─► Element arena ─► classify/filter ─► user parameters
//!          ─► match hosts ─► discover per view ─► rows + columns
//! ```
//!
//! With `essential_fields_only` the pass stops after matching and returns
//! the minimal column set; a later full pass fills in discovered columns.

use std::time::Instant;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::column::{ColumnDef, PerView, View};
use crate::discovery::{discover_parameters, discover_parameters_with_rng, DiscoveryOptions};
use crate::element::{Element, ElementArena, ElementKey, Role, TableRow};
use crate::error::Result;
use crate::hierarchy::CategoryHierarchy;
use crate::parameter::{merge_parameters, ParameterDefinition};
use crate::raw::flatten_tree;
use crate::relationship::{match_children, CategoryConfig};
use crate::user_parameter::{CompiledUserParameters, UserParameter};

/// Pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub categories: CategoryConfig,
    pub discovery: DiscoveryOptions,
    pub user_parameters: Vec<UserParameter>,
    /// When set, a selected category also selects its descendants.
    pub hierarchy: Option<CategoryHierarchy>,
}

/// Counters for one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub elements: usize,
    pub parents: usize,
    pub children: usize,
    pub matched: usize,
    pub orphaned: usize,
    pub filtered_out: usize,
    pub elapsed_ms: u64,
}

/// Result of a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub table_data: Vec<TableRow>,
    /// Default active columns per view.
    pub parameter_columns: PerView<Vec<ColumnDef>>,
    /// Every parameter that can become a column, per view.
    pub available_headers: PerView<Vec<ParameterDefinition>>,
    pub stats: PipelineStats,
    /// False when only essential fields were processed.
    pub complete: bool,
}

/// Runs a pass with default options.
pub async fn process_data_pipeline(
    raw_elements: Value,
    selected_parent_categories: &[String],
    selected_child_categories: &[String],
    essential_fields_only: bool,
) -> Result<PipelineOutput> {
    DataPipeline::default()
        .process(
            raw_elements,
            selected_parent_categories,
            selected_child_categories,
            essential_fields_only,
        )
        .await
}

/// Reusable pipeline holding its options.
#[derive(Debug, Clone, Default)]
pub struct DataPipeline {
    options: PipelineOptions,
}

/// Elements after classification, before discovery.
struct Prepared {
    arena: ElementArena,
    parents: Vec<ElementKey>,
    children: Vec<ElementKey>,
    top_level: Vec<ElementKey>,
    stats: PipelineStats,
}

impl DataPipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Runs a pass; discovery samples with a thread-local generator.
    pub async fn process(
        &self,
        raw_elements: Value,
        selected_parent: &[String],
        selected_child: &[String],
        essential_fields_only: bool,
    ) -> Result<PipelineOutput> {
        let started = Instant::now();
        let prepared = self.prepare(raw_elements, selected_parent, selected_child, essential_fields_only)?;
        if essential_fields_only {
            return Ok(essential_output(prepared, started));
        }

        let discovered = {
            let parents = elements_of(&prepared.arena, &prepared.parents);
            let children = elements_of(&prepared.arena, &prepared.children);
            PerView::new(
                discover_parameters(&parents, &self.options.discovery).await?,
                discover_parameters(&children, &self.options.discovery).await?,
            )
        };
        Ok(self.full_output(prepared, discovered, started))
    }

    /// Runs a pass with a caller-supplied sampling generator.
    pub async fn process_with_rng<R: Rng>(
        &self,
        raw_elements: Value,
        selected_parent: &[String],
        selected_child: &[String],
        rng: &mut R,
    ) -> Result<PipelineOutput> {
        let started = Instant::now();
        let prepared = self.prepare(raw_elements, selected_parent, selected_child, false)?;

        let discovered = {
            let parents = elements_of(&prepared.arena, &prepared.parents);
            let children = elements_of(&prepared.arena, &prepared.children);
            let parent = discover_parameters_with_rng(&parents, &self.options.discovery, rng).await?;
            let child = discover_parameters_with_rng(&children, &self.options.discovery, rng).await?;
            PerView::new(parent, child)
        };
        Ok(self.full_output(prepared, discovered, started))
    }

    fn prepare(
        &self,
        raw_elements: Value,
        selected_parent: &[String],
        selected_child: &[String],
        essential_only: bool,
    ) -> Result<Prepared> {
        self.options.discovery.validate()?;
        let user_params = if essential_only {
            CompiledUserParameters::compile(&[])?
        } else {
            CompiledUserParameters::compile(&self.options.user_parameters)?
        };

        let records = flatten_tree(raw_elements)?;
        let mut stats = PipelineStats {
            elements: records.len(),
            ..PipelineStats::default()
        };

        let (selected_parent, selected_child) = match &self.options.hierarchy {
            Some(h) => (expand(h, selected_parent), expand(h, selected_child)),
            None => (selected_parent.to_vec(), selected_child.to_vec()),
        };
        let classifier = self
            .options
            .categories
            .classifier(&selected_parent, &selected_child);

        let mut arena = ElementArena::new();
        let mut parents = Vec::new();
        let mut children = Vec::new();

        for (index, raw) in records.iter().enumerate() {
            let mut element = Element::from_raw(raw, index, essential_only);
            let role = classifier.classify(&element);
            if !classifier.is_selected(role, &element.category) {
                stats.filtered_out += 1;
                continue;
            }
            if !user_params.is_empty() {
                user_params.apply(&mut element);
            }
            let key = arena.insert(element);
            match role {
                Role::Parent => parents.push(key),
                Role::Child => children.push(key),
            }
        }

        let outcome = match_children(&mut arena, &parents, &children);
        stats.parents = parents.len();
        stats.children = children.len();
        stats.matched = outcome.matched;
        stats.orphaned = outcome.orphaned;

        Ok(Prepared {
            arena,
            parents,
            children,
            top_level: outcome.parents,
            stats,
        })
    }

    fn full_output(
        &self,
        prepared: Prepared,
        discovered: PerView<Vec<ParameterDefinition>>,
        started: Instant,
    ) -> PipelineOutput {
        let user_defs: Vec<ParameterDefinition> = self
            .options
            .user_parameters
            .iter()
            .map(UserParameter::definition)
            .collect();

        let available = |view: View| {
            let mut baseline = view.fixed_parameters();
            baseline.extend(user_defs.iter().cloned());
            merge_parameters(&baseline, discovered.get(view))
        };
        let available_headers = PerView::new(available(View::Parent), available(View::Child));

        let mut stats = prepared.stats;
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            elements = stats.elements,
            parents = stats.parents,
            children = stats.children,
            orphaned = stats.orphaned,
            parent_headers = available_headers.parent.len(),
            child_headers = available_headers.child.len(),
            elapsed_ms = stats.elapsed_ms,
            "Processed element data"
        );

        PipelineOutput {
            table_data: prepared.arena.rows(&prepared.top_level),
            parameter_columns: PerView::new(
                View::Parent.default_columns(),
                View::Child.default_columns(),
            ),
            available_headers,
            stats,
            complete: true,
        }
    }
}

fn essential_output(prepared: Prepared, started: Instant) -> PipelineOutput {
    let mut stats = prepared.stats;
    stats.elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        elements = stats.elements,
        parents = stats.parents,
        children = stats.children,
        elapsed_ms = stats.elapsed_ms,
        "Processed essential fields"
    );

    PipelineOutput {
        table_data: prepared.arena.rows(&prepared.top_level),
        parameter_columns: PerView::new(
            View::Parent.essential_columns(),
            View::Child.essential_columns(),
        ),
        available_headers: PerView::new(
            View::Parent.fixed_parameters(),
            View::Child.fixed_parameters(),
        ),
        stats,
        complete: false,
    }
}

fn elements_of<'a>(arena: &'a ElementArena, keys: &[ElementKey]) -> Vec<&'a Element> {
    keys.iter().filter_map(|&k| arena.get(k)).collect()
}

fn expand(hierarchy: &CategoryHierarchy, selected: &[String]) -> Vec<String> {
    let mut out: Vec<String> = hierarchy.expand_selection(selected).into_iter().collect();
    out.sort_unstable();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::WITHOUT_HOST;
    use serde_json::json;

    fn sample_tree() -> Value {
        json!({
            "name": "Level 1",
            "elements": [
                { "id": "w1", "category": "Walls", "mark": "A", "Width": 200 },
                { "id": "w2", "category": "Walls", "mark": "B", "Width": 250 },
                { "id": "d1", "category": "Doors", "host": "A", "Height": 2100 },
                { "id": "d2", "category": "Doors", "host": "Z", "Height": 2000 }
            ]
        })
    }

    #[tokio::test]
    async fn essential_pass_short_circuits() {
        let out = process_data_pipeline(sample_tree(), &[], &[], true)
            .await
            .unwrap();
        assert!(!out.complete);
        let fields: Vec<_> = out.parameter_columns.parent.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["mark", "category"]);
        assert!(out.table_data.iter().all(|r| r.parameters.is_empty()));
        assert_eq!(out.stats.orphaned, 1);
    }

    #[tokio::test]
    async fn full_pass_discovers_per_view() {
        let out = process_data_pipeline(sample_tree(), &[], &[], false)
            .await
            .unwrap();
        assert!(out.complete);
        assert!(out.available_headers.parent.iter().any(|p| p.field == "Width"));
        assert!(!out.available_headers.parent.iter().any(|p| p.field == "Height"));
        assert!(out.available_headers.child.iter().any(|p| p.field == "Height"));
        assert!(out.available_headers.child[..3].iter().all(|p| p.is_fixed));
    }

    #[tokio::test]
    async fn selection_filters_elements() {
        let walls = vec!["Walls".to_string()];
        let out = process_data_pipeline(sample_tree(), &walls, &["Windows".to_string()], false)
            .await
            .unwrap();
        assert_eq!(out.stats.children, 0);
        assert_eq!(out.stats.filtered_out, 2);
        assert!(out.table_data.iter().all(|r| r.mark != WITHOUT_HOST));
    }

    #[tokio::test]
    async fn user_equation_is_applied() {
        let pipeline = DataPipeline::new(PipelineOptions {
            user_parameters: vec![UserParameter::equation("Half Width", "Width / 2")],
            ..PipelineOptions::default()
        });
        let out = pipeline.process(sample_tree(), &[], &[], false).await.unwrap();
        let w1 = out.table_data.iter().find(|r| r.id == "w1").unwrap();
        assert_eq!(w1.parameters.get("Half Width").and_then(|v| v.as_f64()), Some(100.0));
        let header = out
            .available_headers
            .parent
            .iter()
            .find(|p| p.field == "Half Width")
            .unwrap();
        assert_eq!(header.category.as_deref(), Some(crate::user_parameter::USER_PARAMETERS_GROUP));
    }

    #[tokio::test]
    async fn hierarchy_expands_selection() {
        use crate::hierarchy::CategoryDefinition;

        let hierarchy = CategoryHierarchy::build(vec![
            CategoryDefinition::root("Envelope"),
            CategoryDefinition::child_of("Walls", "Envelope"),
        ])
        .unwrap();
        let pipeline = DataPipeline::new(PipelineOptions {
            hierarchy: Some(hierarchy),
            ..PipelineOptions::default()
        });
        let out = pipeline
            .process(sample_tree(), &["Envelope".to_string()], &[], true)
            .await
            .unwrap();
        assert_eq!(out.stats.parents, 2);
    }
}
