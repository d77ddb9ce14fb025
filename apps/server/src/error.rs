// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types and handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Invalid element data: {0}")]
    InvalidElements(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Store not ready")]
    Unavailable,

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::InvalidElements(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_ELEMENTS"),
            ApiError::Pipeline(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PIPELINE_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            ApiError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<bimtable_core::Error> for ApiError {
    fn from(err: bimtable_core::Error) -> Self {
        use bimtable_core::Error as E;
        match err {
            E::MalformedElement { .. } => ApiError::InvalidElements(err.to_string()),
            E::InvalidOptions(_) | E::ExpressionParse { .. } => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Pipeline(err.to_string()),
        }
    }
}

impl From<bimtable_engine::Error> for ApiError {
    fn from(err: bimtable_engine::Error) -> Self {
        use bimtable_engine::Error as E;
        match err {
            E::TableNotFound(id) => ApiError::NotFound(format!("Table not found: {}", id)),
            E::InvalidTableConfig(_) => ApiError::BadRequest(err.to_string()),
            E::Persistence(msg) => ApiError::Storage(msg),
            E::InitTimeout { .. } => ApiError::Unavailable,
            E::Core(core) => core.into(),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("JSON error: {}", err))
    }
}
