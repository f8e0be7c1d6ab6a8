// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rust SDK for Waypoint event ingestion.
//!
//! The client buffers `track()` and `identify()` calls in an [`EventQueue`]
//! and delivers them in batches to `POST {base_url}/api/v1/events`:
//!
//! - a flush happens when `batch_size` items are buffered (default 10) or
//!   `flush_interval` (default 5s) after the first buffered item
//! - a failed batch goes back to the front of the buffer and is retried on the
//!   next trigger, with exponential backoff between automatic attempts
//! - each request carries at most `max_batch_items` (default 100) items and
//!   `max_batch_bytes` (default 5 MiB), matching the server's limits, so a
//!   large backlog goes out as several requests
//! - the buffer is capped at `max_buffer_size` (default 1000); overflow drops
//!   the oldest items and is counted in [`AnalyticsClient::dropped_events`]
//!
//! # Example
//!
//! ```ignore
//! use waypoint_analytics::{AnalyticsClient, Properties};
//!
//! let client = AnalyticsClient::builder()
//!     .api_key("wp_live_xxx")
//!     .base_url("https://waypoint.example.com")
//!     .build()?;
//!
//! client.track("Signup Started", Properties::new().insert("source", "ads")).await?;
//! client.shutdown().await?;
//! ```

mod client;
mod error;
mod properties;
mod queue;
mod transport;

pub use client::{AnalyticsClient, AnalyticsClientBuilder, ClientConfig};
pub use error::{AnalyticsError, Result};
pub use properties::Properties;
pub use queue::{BatchState, EventQueue, FlushOutcome, QueueConfig, QueueTarget};
pub use transport::{BatchTransport, HttpBatchTransport, API_KEY_HEADER, EVENTS_PATH};

pub use waypoint_analytics_core::{BatchEntry, IdentifyRecord, IngestResponse, TrackedEvent};
pub use waypoint_common_http::RetryConfig;
