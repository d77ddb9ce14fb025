// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request types for the API.

use bimtable_core::UserParameter;
use serde::Deserialize;
use serde_json::Value;

/// Body of `POST /api/v1/pipeline`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    /// Upstream element tree or flat list.
    pub elements: Value,
    #[serde(default)]
    pub selected_parent_categories: Vec<String>,
    #[serde(default)]
    pub selected_child_categories: Vec<String>,
    #[serde(default)]
    pub essential_fields_only: bool,
    /// Computed parameters applied to every element.
    #[serde(default)]
    pub user_parameters: Vec<UserParameter>,
}
