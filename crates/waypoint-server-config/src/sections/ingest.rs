// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ingestion configuration: batch limits and the API key table.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_MAX_BATCH_ITEMS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
	pub max_batch_items: usize,
	/// API key to tenant id.
	pub api_keys: HashMap<String, String>,
}

impl Default for IngestConfig {
	fn default() -> Self {
		Self {
			max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
			api_keys: HashMap::new(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestConfigLayer {
	#[serde(default)]
	pub max_batch_items: Option<usize>,
	#[serde(default)]
	pub api_keys: Option<HashMap<String, String>>,
}

impl IngestConfigLayer {
	pub fn merge(&mut self, other: IngestConfigLayer) {
		if other.max_batch_items.is_some() {
			self.max_batch_items = other.max_batch_items;
		}
		if other.api_keys.is_some() {
			self.api_keys = other.api_keys;
		}
	}

	pub fn finalize(self) -> IngestConfig {
		IngestConfig {
			max_batch_items: self.max_batch_items.unwrap_or(DEFAULT_MAX_BATCH_ITEMS),
			api_keys: self.api_keys.unwrap_or_default(),
		}
	}
}

/// Parses `key=tenant` pairs separated by commas.
pub fn parse_api_keys(key: &str, value: &str) -> Result<HashMap<String, String>, ConfigError> {
	value
		.split(',')
		.map(str::trim)
		.filter(|pair| !pair.is_empty())
		.map(|pair| match pair.split_once('=') {
			Some((api_key, tenant)) if !api_key.trim().is_empty() && !tenant.trim().is_empty() => {
				Ok((api_key.trim().to_string(), tenant.trim().to_string()))
			}
			_ => Err(ConfigError::InvalidValue {
				key: key.to_string(),
				message: format!("expected key=tenant, got '{pair}'"),
			}),
		})
		.collect()
}
