// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration loaded from environment variables.

use std::str::FromStr;

use bimtable_core::{CategoryConfig, DiscoveryOptions, PipelineOptions};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Directory holding the table store.
    pub data_dir: String,
    /// Maximum request body size in MB.
    pub max_body_mb: usize,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    pub discovery_sample_size: usize,
    pub discovery_min_frequency: f64,
    /// Overrides the built-in host categories when non-empty.
    pub parent_categories: Vec<String>,
    /// Overrides the built-in hosted categories when non-empty.
    pub child_categories: Vec<String>,
    /// Allowed CORS origins, or `*`.
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            port: env_or("PORT", 8080),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| {
                if std::path::Path::new("/.dockerenv").exists() {
                    "/app/data".into()
                } else {
                    std::env::current_dir()
                        .ok()
                        .and_then(|dir| dir.join(".data").to_str().map(|s| s.to_string()))
                        .unwrap_or_else(|| "./.data".into())
                }
            }),
            max_body_mb: env_or("MAX_BODY_MB", 64),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 120),
            discovery_sample_size: env_or("DISCOVERY_SAMPLE_SIZE", 100),
            discovery_min_frequency: env_or("DISCOVERY_MIN_FREQUENCY", 0.1),
            parent_categories: env_list("PARENT_CATEGORIES").unwrap_or_default(),
            child_categories: env_list("CHILD_CATEGORIES").unwrap_or_default(),
            cors_origins: env_list("CORS_ORIGINS").unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".into(),
                    "http://localhost:5173".into(),
                    "http://127.0.0.1:3000".into(),
                    "http://127.0.0.1:5173".into(),
                ]
            }),
        }
    }

    /// Pipeline options derived from the discovery and category settings.
    pub fn pipeline_options(&self) -> PipelineOptions {
        let mut categories = CategoryConfig::default();
        if !self.parent_categories.is_empty() {
            categories.parent_categories = self.parent_categories.clone();
        }
        if !self.child_categories.is_empty() {
            categories.child_categories = self.child_categories.clone();
        }
        PipelineOptions {
            categories,
            discovery: DiscoveryOptions {
                sample_size: self.discovery_sample_size,
                min_frequency: self.discovery_min_frequency,
                ..DiscoveryOptions::default()
            },
            ..PipelineOptions::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: "./.data".into(),
            max_body_mb: 64,
            request_timeout_secs: 120,
            discovery_sample_size: 100,
            discovery_min_frequency: 0.1,
            parent_categories: Vec::new(),
            child_categories: Vec::new(),
            cors_origins: vec!["*".into()],
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}

/// Comma-separated list; `None` when unset.
fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_overrides_replace_only_the_given_list() {
        let config = Config {
            parent_categories: vec!["Walls".into()],
            ..Config::default()
        };
        let options = config.pipeline_options();
        assert_eq!(options.categories.parent_categories, vec!["Walls".to_string()]);
        assert_eq!(
            options.categories.child_categories,
            CategoryConfig::default().child_categories
        );
        assert_eq!(options.discovery.sample_size, 100);
    }
}
