// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # BIM Table Core
//!
//! Turns raw, irregularly shaped building-element records into table rows
//! and the parameters that can become table columns.
//!
//! ## Overview
//!
//! - **Boundary decoding**: untyped model trees are flattened into
//!   [`RawElement`]s and materialised as [`Element`]s in an arena
//! - **Type & group inference**: primitive type and originating group of
//!   every field
//! - **Parameter discovery**: frequency-based sampling merged with the
//!   fixed baseline of each view
//! - **Relationship matching**: mark↔host matching of hosted elements with
//!   a synthetic "Without Host" bucket for orphans
//! - **Category hierarchy**: validated, acyclic category tree for filtering
//! - **Equation parameters**: a restricted arithmetic grammar evaluated
//!   against element values
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bimtable_core::process_data_pipeline;
//! use serde_json::json;
//!
//! let tree = json!([
//!     { "id": "1", "category": "Walls", "mark": "W-01", "Width": 200 },
//!     { "id": "2", "category": "Doors", "host": "W-01" }
//! ]);
//!
//! let out = process_data_pipeline(tree, &[], &[], false).await?;
//! assert_eq!(out.table_data[0].details.len(), 1);
//! ```
//!
//! ## Progressive Loading
//!
//! Pass `essential_fields_only = true` for a fast first paint with only
//! the essential columns, then run a full pass to discover the rest.

pub mod column;
pub mod discovery;
pub mod element;
pub mod error;
pub mod expression;
pub mod hierarchy;
pub mod inference;
pub mod parameter;
pub mod pipeline;
pub mod raw;
pub mod relationship;
pub mod user_parameter;
pub mod value;

pub use column::{ColumnDef, ColumnItem, PerView, View};
pub use discovery::{discover_parameters, discover_parameters_with_rng, DiscoveryOptions};
pub use element::{Element, ElementArena, ElementKey, Parameters, Role, TableRow, UNCATEGORIZED};
pub use error::{Error, Result};
pub use expression::{Expr, Expression, VariableSource};
pub use hierarchy::{CategoryDefinition, CategoryHierarchy, CategoryNode, HierarchyUpdate};
pub use inference::{infer_group, infer_type};
pub use parameter::{
    default_optional_parameters, fixed_child_parameters, fixed_parent_parameters,
    merge_parameters, normalize_field, ParameterDefinition, CUSTOM_PARAMETERS, ESSENTIAL_FIELDS,
};
pub use pipeline::{
    process_data_pipeline, DataPipeline, PipelineOptions, PipelineOutput, PipelineStats,
};
pub use raw::{flatten_tree, RawElement};
pub use relationship::{
    classify, match_children, CategoryConfig, Classifier, MatchOutcome, WITHOUT_HOST,
    WITHOUT_HOST_ID,
};
pub use user_parameter::{UserParameter, UserParameterValue};
pub use value::{ParameterType, PrimitiveValue};
