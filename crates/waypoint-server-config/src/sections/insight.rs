// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! AI explainer configuration. Without an `explainer_url` funnel reports
//! never carry an insight.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_INSIGHT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightConfig {
	pub explainer_url: Option<String>,
	pub timeout_secs: u64,
}

impl InsightConfig {
	pub fn is_enabled(&self) -> bool {
		self.explainer_url.is_some()
	}

	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}
}

impl Default for InsightConfig {
	fn default() -> Self {
		Self {
			explainer_url: None,
			timeout_secs: DEFAULT_INSIGHT_TIMEOUT_SECS,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightConfigLayer {
	#[serde(default)]
	pub explainer_url: Option<String>,
	#[serde(default)]
	pub timeout_secs: Option<u64>,
}

impl InsightConfigLayer {
	pub fn merge(&mut self, other: InsightConfigLayer) {
		if other.explainer_url.is_some() {
			self.explainer_url = other.explainer_url;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	pub fn finalize(self) -> InsightConfig {
		InsightConfig {
			explainer_url: self
				.explainer_url
				.map(|url| url.trim().to_string())
				.filter(|url| !url.is_empty()),
			timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_INSIGHT_TIMEOUT_SECS),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_disabled_by_default() {
		let config = InsightConfigLayer::default().finalize();
		assert!(!config.is_enabled());
		assert_eq!(config.timeout(), Duration::from_secs(30));
	}

	#[test]
	fn test_blank_url_disables() {
		let layer = InsightConfigLayer {
			explainer_url: Some("  ".to_string()),
			timeout_secs: Some(5),
		};
		let config = layer.finalize();
		assert!(!config.is_enabled());
		assert_eq!(config.timeout_secs, 5);
	}
}
