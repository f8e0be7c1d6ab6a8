// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracked events and identify records.
//!
//! A [`TrackedEvent`] is immutable once it has been queued. The SDK owns it
//! until a flush hands it to the transport, and the server hands it to the
//! event store, which assigns the [`EventId`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Maximum allowed length for event names.
pub const MAX_EVENT_NAME_LENGTH: usize = 200;

/// Maximum allowed length for user and anonymous identifiers.
pub const MAX_IDENTIFIER_LENGTH: usize = 200;

/// Maximum allowed size for serialized properties or traits (1 MB).
pub const MAX_PROPERTIES_SIZE: usize = 1024 * 1024;

/// Store-assigned identifier for a persisted event.
///
/// UUIDv7 keeps identifiers roughly ordered by insertion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
	pub fn new() -> Self {
		let uuid7_val = uuid7::uuid7();
		Self(Uuid::from_bytes(*uuid7_val.as_bytes()))
	}
}

impl Default for EventId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for EventId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for EventId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Tenant that owns events, identities and workflows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for TenantId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for TenantId {
	fn from(s: &str) -> Self {
		Self(s.to_string())
	}
}

/// A user action captured by `track()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEvent {
	pub event_name: String,
	pub properties: serde_json::Value,
	pub user_id: Option<String>,
	pub anonymous_id: Option<String>,
	pub session_id: Option<String>,
	pub timestamp: DateTime<Utc>,
	#[serde(default)]
	pub context: BTreeMap<String, String>,
}

impl TrackedEvent {
	/// Creates an event stamped with the current wall-clock time.
	pub fn new(event_name: impl Into<String>, anonymous_id: impl Into<String>) -> Self {
		Self {
			event_name: event_name.into(),
			properties: serde_json::json!({}),
			user_id: None,
			anonymous_id: Some(anonymous_id.into()),
			session_id: None,
			timestamp: Utc::now(),
			context: BTreeMap::new(),
		}
	}

	pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
		self.properties = properties;
		self
	}

	pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
		self.user_id = user_id;
		self
	}

	pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
		self.session_id = Some(session_id.into());
		self
	}

	pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = timestamp;
		self
	}

	pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.context.insert(key.into(), value.into());
		self
	}

	/// The identity funnels count: `user_id` when known, else `anonymous_id`.
	pub fn actor_id(&self) -> Option<&str> {
		self.user_id.as_deref().or(self.anonymous_id.as_deref())
	}

	/// Checks the event name, the identity invariant and the properties size.
	pub fn validate(&self) -> Result<()> {
		validate_event_name(&self.event_name)?;
		if self.user_id.is_none() && self.anonymous_id.is_none() {
			return Err(CoreError::MissingIdentity);
		}
		if let Some(user_id) = &self.user_id {
			validate_identifier(user_id)?;
		}
		if let Some(anonymous_id) = &self.anonymous_id {
			validate_identifier(anonymous_id)?;
		}
		validate_properties_size(&self.properties)
	}
}

/// Traits attached to a known user. Stores keep the newest record per
/// `(tenant, user_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyRecord {
	pub user_id: String,
	pub anonymous_id: Option<String>,
	pub traits: serde_json::Value,
	pub timestamp: DateTime<Utc>,
}

impl IdentifyRecord {
	pub fn new(user_id: impl Into<String>) -> Self {
		Self {
			user_id: user_id.into(),
			anonymous_id: None,
			traits: serde_json::json!({}),
			timestamp: Utc::now(),
		}
	}

	pub fn with_anonymous_id(mut self, anonymous_id: impl Into<String>) -> Self {
		self.anonymous_id = Some(anonymous_id.into());
		self
	}

	pub fn with_traits(mut self, traits: serde_json::Value) -> Self {
		self.traits = traits;
		self
	}

	pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = timestamp;
		self
	}

	pub fn validate(&self) -> Result<()> {
		validate_identifier(&self.user_id)?;
		if let Some(anonymous_id) = &self.anonymous_id {
			validate_identifier(anonymous_id)?;
		}
		validate_properties_size(&self.traits)
	}
}

/// Validates an event name.
///
/// Valid names are non-empty, at most 200 characters, and use only ASCII
/// alphanumerics, `_`, `$`, `.`, `-`, `:` or spaces.
pub fn validate_event_name(name: &str) -> Result<()> {
	if name.trim().is_empty() || name.len() > MAX_EVENT_NAME_LENGTH {
		return Err(CoreError::InvalidEventName(name.to_string()));
	}

	let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '-' | ':' | ' ');
	if !name.chars().all(allowed) {
		return Err(CoreError::InvalidEventName(name.to_string()));
	}

	Ok(())
}

/// Validates a user or anonymous identifier.
pub fn validate_identifier(id: &str) -> Result<()> {
	if id.trim().is_empty() || id.len() > MAX_IDENTIFIER_LENGTH {
		return Err(CoreError::InvalidIdentifier(id.to_string()));
	}
	Ok(())
}

/// Validates that a properties or traits value serializes within the size limit.
pub fn validate_properties_size(properties: &serde_json::Value) -> Result<()> {
	let size = serde_json::to_string(properties)?.len();
	if size > MAX_PROPERTIES_SIZE {
		return Err(CoreError::PropertiesTooLarge(size, MAX_PROPERTIES_SIZE));
	}
	Ok(())
}
