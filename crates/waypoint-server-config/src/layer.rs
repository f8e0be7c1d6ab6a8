// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{
	DatabaseConfigLayer, FunnelConfigLayer, HttpConfigLayer, IngestConfigLayer, InsightConfigLayer,
	LoggingConfigLayer,
};

/// One source's view of the configuration. Unset sections stay `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub funnel: Option<FunnelConfigLayer>,
	#[serde(default)]
	pub insight: Option<InsightConfigLayer>,
	#[serde(default)]
	pub ingest: Option<IngestConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

macro_rules! merge_section {
	($self:ident, $other:ident, $field:ident) => {
		if let Some(incoming) = $other.$field {
			$self.$field.get_or_insert_with(Default::default).merge(incoming);
		}
	};
}

impl ServerConfigLayer {
	/// Overlays `other` on top of `self`; fields set in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section!(self, other, http);
		merge_section!(self, other, database);
		merge_section!(self, other, funnel);
		merge_section!(self, other, insight);
		merge_section!(self, other, ingest);
		merge_section!(self, other, logging);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_overlays_sections() {
		let mut base: ServerConfigLayer = toml::from_str(
			r#"
			[http]
			host = "127.0.0.1"
			port = 9000

			[funnel]
			clamp_percentages = true
			"#,
		)
		.unwrap();

		let overlay: ServerConfigLayer = toml::from_str(
			r#"
			[http]
			port = 9100

			[database]
			url = "sqlite::memory:"
			"#,
		)
		.unwrap();

		base.merge(overlay);

		let http = base.http.unwrap().finalize();
		assert_eq!(http.host, "127.0.0.1");
		assert_eq!(http.port, 9100);
		assert_eq!(base.database.unwrap().finalize().url, "sqlite::memory:");
		assert!(base.funnel.unwrap().finalize().clamp_percentages);
	}
}
