// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Waypoint event ingestion and funnel analytics.
//!
//! Shared by the client SDK (`waypoint-analytics`) and the server
//! (`waypoint-server-analytics`):
//! - [`TrackedEvent`] and [`IdentifyRecord`], the two things a client emits
//! - the ingestion wire format ([`IngestBatchRequest`], [`BatchItem`])
//! - workflow definitions, funnel results and [`TimeWindow`] parsing
//! - the explainer request/response pair
//!
//! # Example
//!
//! ```
//! use waypoint_analytics_core::{BatchEntry, TimeWindow, TrackedEvent};
//!
//! let event = TrackedEvent::new("signup", "anon-123")
//!     .with_properties(serde_json::json!({"plan": "pro"}));
//! assert!(event.validate().is_ok());
//!
//! let wire = BatchEntry::Track(event).to_wire();
//! let window: TimeWindow = "7d".parse().unwrap();
//! # let _ = (wire, window);
//! ```

pub mod error;
pub mod event;
pub mod funnel;
pub mod insight;
pub mod wire;

pub use error::{CoreError, Result};
pub use event::{
	validate_event_name, validate_identifier, validate_properties_size, EventId, IdentifyRecord,
	TenantId, TrackedEvent, MAX_EVENT_NAME_LENGTH, MAX_IDENTIFIER_LENGTH, MAX_PROPERTIES_SIZE,
};
pub use funnel::{
	FunnelResult, FunnelStepDefinition, FunnelStepResult, TimeWindow, WorkflowDefinition,
	WorkflowId,
};
pub use insight::{InsightRequest, InsightResponse, InsightStep};
pub use wire::{
	BatchEntry, BatchItem, ErrorResponse, IdentifyPayload, IngestBatchRequest, IngestResponse,
	TrackPayload, BATCH_ENVELOPE_BYTES, CONTEXT_LIBRARY, CONTEXT_LIBRARY_VERSION, CONTEXT_SESSION_ID,
	DEFAULT_MAX_BATCH_ITEMS, MAX_BATCH_BODY_BYTES,
};
