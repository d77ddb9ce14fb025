// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Named-table endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bimtable_engine::{TableConfig, TableConfigPatch, TableStore};
use serde_json::Value;

use crate::error::ApiError;
use crate::AppState;

fn require_name(patch: &TableConfigPatch) -> Result<(), ApiError> {
    match patch.name.as_deref() {
        Some(name) if name.trim().is_empty() => {
            Err(ApiError::BadRequest("table name must not be empty".into()))
        }
        _ => Ok(()),
    }
}

/// GET /api/v1/tables - Every stored table.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<TableConfig>>, ApiError> {
    let tables = state.store.fetch_all().await?;
    tracing::debug!(count = tables.len(), "Listed tables");
    Ok(Json(tables))
}

/// POST /api/v1/tables - Create a table under a fresh id.
///
/// Missing column lists fall back to the defaults.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<TableConfig>), ApiError> {
    let id = uuid::Uuid::new_v4().to_string();
    let patch = TableConfigPatch::decode(body, &id)?;
    if patch.name.is_none() {
        return Err(ApiError::BadRequest("table name is required".into()));
    }
    require_name(&patch)?;
    let table = state.store.save(&id, patch).await?;
    tracing::info!(table_id = %table.id, name = %table.name, "Created table");
    Ok((StatusCode::CREATED, Json(table)))
}

/// GET /api/v1/tables/:id
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TableConfig>, ApiError> {
    Ok(Json(state.store.fetch(&id).await?))
}

/// PUT /api/v1/tables/:id - Partial update; unknown ids are created.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<TableConfig>, ApiError> {
    let patch = TableConfigPatch::decode(body, &id)?;
    require_name(&patch)?;
    let table = state.store.save(&id, patch).await?;
    tracing::debug!(table_id = %id, timestamp = table.last_update_timestamp, "Updated table");
    Ok(Json(table))
}

/// DELETE /api/v1/tables/:id
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
