// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event store database configuration.

use serde::Deserialize;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./waypoint.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub url: String,
	/// Pool size for a file-backed store.
	pub max_connections: u32,
}

impl DatabaseConfig {
	/// `sqlite::memory:` and `mode=memory` URLs give every connection its
	/// own empty database.
	pub fn is_in_memory(&self) -> bool {
		self.url.contains(":memory:") || self.url.contains("mode=memory")
	}

	/// Pool size to open. An in-memory store is pinned to one connection so
	/// every query sees the same database.
	pub fn pool_size(&self) -> u32 {
		if self.is_in_memory() {
			1
		} else {
			self.max_connections
		}
	}
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			url: DEFAULT_DATABASE_URL.to_string(),
			max_connections: DEFAULT_MAX_CONNECTIONS,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub max_connections: Option<u32>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.max_connections.is_some() {
			self.max_connections = other.max_connections;
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		DatabaseConfig {
			url: self
				.url
				.map(|url| url.trim().to_string())
				.filter(|url| !url.is_empty())
				.unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
			max_connections: self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
		}
	}
}
