// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data pipeline endpoint.

use axum::{extract::State, Json};
use bimtable_core::{DataPipeline, PipelineOptions, PipelineOutput};

use crate::error::ApiError;
use crate::types::PipelineRequest;
use crate::AppState;

/// POST /api/v1/pipeline - Raw elements in, table rows and columns out.
pub async fn run(
    State(state): State<AppState>,
    Json(request): Json<PipelineRequest>,
) -> Result<Json<PipelineOutput>, ApiError> {
    let PipelineRequest {
        elements,
        selected_parent_categories,
        selected_child_categories,
        essential_fields_only,
        user_parameters,
    } = request;

    let pipeline = DataPipeline::new(PipelineOptions {
        user_parameters,
        ..state.pipeline.as_ref().clone()
    });
    let output = pipeline
        .process(
            elements,
            &selected_parent_categories,
            &selected_child_categories,
            essential_fields_only,
        )
        .await?;

    tracing::info!(
        rows = output.table_data.len(),
        elements = output.stats.elements,
        complete = output.complete,
        elapsed_ms = output.stats.elapsed_ms,
        "Pipeline pass complete"
    );
    Ok(Json(output))
}
