// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Funnel engine configuration.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelConfig {
	/// Clamp drop-off and overall conversion into `[0, 100]`.
	pub clamp_percentages: bool,
	pub query_timeout_secs: u64,
}

impl FunnelConfig {
	pub fn query_timeout(&self) -> Duration {
		Duration::from_secs(self.query_timeout_secs)
	}
}

impl Default for FunnelConfig {
	fn default() -> Self {
		Self {
			clamp_percentages: false,
			query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunnelConfigLayer {
	#[serde(default)]
	pub clamp_percentages: Option<bool>,
	#[serde(default)]
	pub query_timeout_secs: Option<u64>,
}

impl FunnelConfigLayer {
	pub fn merge(&mut self, other: FunnelConfigLayer) {
		if other.clamp_percentages.is_some() {
			self.clamp_percentages = other.clamp_percentages;
		}
		if other.query_timeout_secs.is_some() {
			self.query_timeout_secs = other.query_timeout_secs;
		}
	}

	pub fn finalize(self) -> FunnelConfig {
		FunnelConfig {
			clamp_percentages: self.clamp_percentages.unwrap_or(false),
			query_timeout_secs: self.query_timeout_secs.unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS),
		}
	}
}
