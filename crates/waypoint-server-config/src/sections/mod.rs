// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod database;
pub mod funnel;
pub mod http;
pub mod ingest;
pub mod insight;
pub mod logging;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use funnel::{FunnelConfig, FunnelConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use ingest::{parse_api_keys, IngestConfig, IngestConfigLayer};
pub use insight::{InsightConfig, InsightConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
