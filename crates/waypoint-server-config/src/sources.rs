// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file, and the environment.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	parse_api_keys, DatabaseConfigLayer, FunnelConfigLayer, HttpConfigLayer, IngestConfigLayer,
	InsightConfigLayer, LogFormat, LoggingConfigLayer,
};

/// Default location of the server config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/waypoint/server.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file source. A missing file is an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `WAYPOINT_SERVER_<SECTION>_<FIELD>`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: env_var("WAYPOINT_SERVER_HOST"),
				port: env_parse("WAYPOINT_SERVER_PORT")?,
			}),
			database: Some(DatabaseConfigLayer {
				url: env_var("WAYPOINT_SERVER_DATABASE_URL"),
				max_connections: env_parse("WAYPOINT_SERVER_DATABASE_MAX_CONNECTIONS")?,
			}),
			funnel: Some(FunnelConfigLayer {
				clamp_percentages: env_bool("WAYPOINT_SERVER_FUNNEL_CLAMP_PERCENTAGES"),
				query_timeout_secs: env_parse("WAYPOINT_SERVER_FUNNEL_QUERY_TIMEOUT_SECS")?,
			}),
			insight: Some(InsightConfigLayer {
				explainer_url: env_var("WAYPOINT_SERVER_INSIGHT_EXPLAINER_URL"),
				timeout_secs: env_parse("WAYPOINT_SERVER_INSIGHT_TIMEOUT_SECS")?,
			}),
			ingest: Some(load_ingest_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {} value '{v}'", std::any::type_name::<T>()),
		}),
		None => Ok(None),
	}
}

fn load_ingest_from_env() -> Result<IngestConfigLayer, ConfigError> {
	const API_KEYS: &str = "WAYPOINT_SERVER_INGEST_API_KEYS";

	let api_keys = match env_var(API_KEYS) {
		Some(value) => Some(parse_api_keys(API_KEYS, &value)?),
		None => None,
	};

	Ok(IngestConfigLayer {
		max_batch_items: env_parse("WAYPOINT_SERVER_INGEST_MAX_BATCH_ITEMS")?,
		api_keys,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	const FORMAT: &str = "WAYPOINT_SERVER_LOG_FORMAT";

	let format = match env_var(FORMAT) {
		Some(value) => Some(LogFormat::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
			key: FORMAT.to_string(),
			message: format!("expected 'text' or 'json', got '{value}'"),
		})?),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("WAYPOINT_SERVER_LOG_LEVEL"),
		format,
	})
}
