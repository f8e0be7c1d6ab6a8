// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Build information for `waypoint-server version`.

/// Format version info for display.
pub fn format_version_info() -> String {
	format!(
		"waypoint-server version: {}\n\
         Platform:                {}-{}\n\
         User agent:              {}",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH,
		waypoint_common_http::user_agent(),
	)
}
