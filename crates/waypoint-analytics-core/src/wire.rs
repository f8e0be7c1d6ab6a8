// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JSON wire format for `POST /api/v1/events`.
//!
//! ```json
//! {"batch": [{"type": "track", "name": "signup", "anonymousId": "anon-1",
//!   "timestamp": "2025-01-01T00:00:00Z", "context": {"sessionId": "session-..."}}]}
//! ```
//!
//! Absent optional fields are omitted rather than sent as `null`. The session
//! identifier travels inside `context` under [`CONTEXT_SESSION_ID`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::event::{IdentifyRecord, TrackedEvent};

/// Context key carrying the SDK session identifier.
pub const CONTEXT_SESSION_ID: &str = "sessionId";
/// Context key carrying the SDK library name.
pub const CONTEXT_LIBRARY: &str = "library";
/// Context key carrying the SDK library version.
pub const CONTEXT_LIBRARY_VERSION: &str = "libraryVersion";

/// Default cap on items in one ingestion request.
pub const DEFAULT_MAX_BATCH_ITEMS: usize = 100;

/// Cap on the encoded size of one ingestion request body. A single item at
/// the property size limit always fits.
pub const MAX_BATCH_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Bytes of `{"batch":[` plus `]}` around the items.
pub const BATCH_ENVELOPE_BYTES: usize = 12;

/// Request body accepted by the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestBatchRequest {
	pub batch: Vec<BatchItem>,
}

/// A single item in an ingestion batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BatchItem {
	Track(TrackPayload),
	Identify(IdentifyPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub anonymous_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub properties: Option<serde_json::Value>,
	pub timestamp: DateTime<Utc>,
	#[serde(default)]
	pub context: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyPayload {
	pub user_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub anonymous_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub traits: Option<serde_json::Value>,
	pub timestamp: DateTime<Utc>,
	#[serde(default)]
	pub context: BTreeMap<String, String>,
}

/// `202 Accepted` body returned by the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
	pub status: String,
	pub event_count: usize,
	pub queued_id: String,
}

impl IngestResponse {
	pub fn accepted(event_count: usize) -> Self {
		let queued = uuid7::uuid7();
		Self {
			status: "accepted".to_string(),
			event_count,
			queued_id: Uuid::from_bytes(*queued.as_bytes()).to_string(),
		}
	}
}

/// JSON error body shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

/// An item held in the SDK buffer, in its typed form.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEntry {
	Track(TrackedEvent),
	Identify(IdentifyRecord),
}

impl BatchEntry {
	pub fn kind(&self) -> &'static str {
		match self {
			BatchEntry::Track(_) => "track",
			BatchEntry::Identify(_) => "identify",
		}
	}

	pub fn validate(&self) -> Result<()> {
		match self {
			BatchEntry::Track(event) => event.validate(),
			BatchEntry::Identify(record) => record.validate(),
		}
	}

	/// Size of the entry once encoded as a batch item, excluding separators.
	pub fn encoded_len(&self) -> usize {
		serde_json::to_vec(&self.to_wire())
			.map(|bytes| bytes.len())
			.unwrap_or(0)
	}

	/// Encodes the entry for the wire, moving `session_id` into `context`.
	pub fn to_wire(&self) -> BatchItem {
		match self {
			BatchEntry::Track(event) => {
				let mut context = event.context.clone();
				if let Some(session_id) = &event.session_id {
					context.insert(CONTEXT_SESSION_ID.to_string(), session_id.clone());
				}
				BatchItem::Track(TrackPayload {
					name: event.event_name.clone(),
					user_id: event.user_id.clone(),
					anonymous_id: event.anonymous_id.clone(),
					properties: non_empty(&event.properties),
					timestamp: event.timestamp,
					context,
				})
			}
			BatchEntry::Identify(record) => BatchItem::Identify(IdentifyPayload {
				user_id: record.user_id.clone(),
				anonymous_id: record.anonymous_id.clone(),
				traits: non_empty(&record.traits),
				timestamp: record.timestamp,
				context: BTreeMap::new(),
			}),
		}
	}
}

impl From<TrackedEvent> for BatchEntry {
	fn from(event: TrackedEvent) -> Self {
		BatchEntry::Track(event)
	}
}

impl From<IdentifyRecord> for BatchEntry {
	fn from(record: IdentifyRecord) -> Self {
		BatchEntry::Identify(record)
	}
}

impl TryFrom<BatchItem> for BatchEntry {
	type Error = CoreError;

	/// Decodes and validates a wire item.
	fn try_from(item: BatchItem) -> Result<Self> {
		let entry = match item {
			BatchItem::Track(mut payload) => {
				let session_id = payload.context.remove(CONTEXT_SESSION_ID);
				BatchEntry::Track(TrackedEvent {
					event_name: payload.name,
					properties: payload.properties.unwrap_or_else(|| serde_json::json!({})),
					user_id: payload.user_id,
					anonymous_id: payload.anonymous_id,
					session_id,
					timestamp: payload.timestamp,
					context: payload.context,
				})
			}
			BatchItem::Identify(payload) => BatchEntry::Identify(IdentifyRecord {
				user_id: payload.user_id,
				anonymous_id: payload.anonymous_id,
				traits: payload.traits.unwrap_or_else(|| serde_json::json!({})),
				timestamp: payload.timestamp,
			}),
		};
		entry.validate()?;
		Ok(entry)
	}
}

fn non_empty(value: &serde_json::Value) -> Option<serde_json::Value> {
	match value {
		serde_json::Value::Null => None,
		serde_json::Value::Object(map) if map.is_empty() => None,
		other => Some(other.clone()),
	}
}
