// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Health check endpoint.

use axum::{extract::State, http::StatusCode, Json};
use bimtable_engine::TableStore;
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
}

/// API information response.
#[derive(Debug, Serialize)]
pub struct ApiInfoResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

const ENDPOINTS: [(&str, &str, &str); 7] = [
    ("GET", "/api/v1/health", "Health check"),
    ("GET", "/api/v1/tables", "List stored tables"),
    ("POST", "/api/v1/tables", "Create a table"),
    ("GET", "/api/v1/tables/:id", "Fetch one table"),
    ("PUT", "/api/v1/tables/:id", "Partially update a table, creating it if missing"),
    ("DELETE", "/api/v1/tables/:id", "Delete a table"),
    ("POST", "/api/v1/pipeline", "Turn raw elements into table rows and columns"),
];

/// GET /api/v1/health - Health check endpoint.
///
/// Answers 503 while the store directory is unavailable so clients polling
/// for readiness keep waiting.
pub async fn check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, label) = if state.store.is_ready().await {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };
    (
        status,
        Json(HealthResponse {
            status: label,
            version: env!("CARGO_PKG_VERSION"),
            service: "bimtable-server",
        }),
    )
}

/// GET / - API information endpoint.
pub async fn info() -> Json<ApiInfoResponse> {
    Json(ApiInfoResponse {
        service: "bimtable-server",
        version: env!("CARGO_PKG_VERSION"),
        description: "Named-table store and element pipeline for BIM schedules",
        endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, description)| EndpointInfo {
                method,
                path,
                description,
            })
            .collect(),
    })
}
