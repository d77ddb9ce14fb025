// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BIM Table Server - named-table store and element pipeline.
//!
//! The server is the persistence collaborator of table sessions: it keeps
//! table configurations on disk and answers the REST calls made by
//! `bimtable_engine::HttpTableStore`. It also exposes the data pipeline so
//! thin clients can turn raw element trees into table rows.
//!
//! # Endpoints
//!
//! - `GET /api/v1/health` - Health check (503 until the store is usable)
//! - `GET /api/v1/tables` - List tables
//! - `POST /api/v1/tables` - Create a table
//! - `GET|PUT|DELETE /api/v1/tables/:id` - Fetch, partially update, delete
//! - `POST /api/v1/pipeline` - Run the data pipeline

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use bimtable_core::PipelineOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    decompression::RequestDecompressionLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

mod config;
mod error;
mod routes;
mod services;
mod types;

use config::Config;
use services::DiskTableStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DiskTableStore>,
    pub config: Arc<Config>,
    pub pipeline: Arc<PipelineOptions>,
}

impl AppState {
    pub fn new(store: DiskTableStore, config: Config) -> Self {
        Self {
            store: Arc::new(store),
            pipeline: Arc::new(config.pipeline_options()),
            config: Arc::new(config),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Builds the router with its middleware stack.
pub fn app(state: AppState) -> Router {
    let config = Arc::clone(&state.config);
    Router::new()
        .route("/", get(routes::health::info))
        .route("/api/v1/health", get(routes::health::check))
        .route(
            "/api/v1/tables",
            get(routes::tables::list).post(routes::tables::create),
        )
        .route(
            "/api/v1/tables/:id",
            get(routes::tables::get)
                .put(routes::tables::update)
                .delete(routes::tables::delete),
        )
        .route("/api/v1/pipeline", post(routes::pipeline::run))
        .layer(DefaultBodyLimit::max(config.max_body_mb * 1024 * 1024))
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,bimtable_server=debug".into()),
        )
        .pretty()
        .init();

    let config = Config::from_env();

    tracing::info!(
        port = config.port,
        data_dir = %config.data_dir,
        max_body_mb = config.max_body_mb,
        discovery_sample_size = config.discovery_sample_size,
        "Starting BIM Table Server"
    );

    let store = DiskTableStore::open(&config.data_dir)
        .await
        .expect("Failed to open table store");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = app(AppState::new(store, config));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Router over a store in a fresh temporary directory.
    pub async fn test_app() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskTableStore::open(dir.path()).await.unwrap();
        let config = Config {
            data_dir: dir.path().display().to_string(),
            ..Config::default()
        };
        (app(AppState::new(store, config)), dir)
    }
}
