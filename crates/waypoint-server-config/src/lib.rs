// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Waypoint analytics server.
//!
//! Layered from built-in defaults, a TOML file and `WAYPOINT_SERVER_*`
//! environment variables, in that order of increasing precedence.
//!
//! # Usage
//!
//! ```ignore
//! use waypoint_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub funnel: FunnelConfig,
	pub insight: InsightConfig,
	pub ingest: IngestConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Loads configuration with the system config file.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`WAYPOINT_SERVER_*`)
/// 2. Config file (`/etc/waypoint/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Loads configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merges `sources` by precedence and resolves the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		http: layer.http.unwrap_or_default().finalize(),
		database: layer.database.unwrap_or_default().finalize(),
		funnel: layer.funnel.unwrap_or_default().finalize(),
		insight: layer.insight.unwrap_or_default().finalize(),
		ingest: layer.ingest.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		clamp_percentages = config.funnel.clamp_percentages,
		explainer_configured = config.insight.is_enabled(),
		api_keys = config.ingest.api_keys.len(),
		"server configuration loaded"
	);

	Ok(config)
}

/// Cross-field rules that a single section cannot check.
fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.database.max_connections == 0 {
		return Err(ConfigError::Validation(
			"database.max_connections must be at least 1".to_string(),
		));
	}
	if config.ingest.max_batch_items == 0 {
		return Err(ConfigError::Validation(
			"ingest.max_batch_items must be at least 1".to_string(),
		));
	}
	if config.funnel.query_timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"funnel.query_timeout_secs must be at least 1".to_string(),
		));
	}
	if config.insight.timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"insight.timeout_secs must be at least 1".to_string(),
		));
	}
	if let Some(url) = &config.insight.explainer_url {
		if !(url.starts_with("http://") || url.starts_with("https://")) {
			return Err(ConfigError::Validation(format!(
				"insight.explainer_url must be an http(s) URL, got '{url}'"
			)));
		}
	}
	Ok(())
}
