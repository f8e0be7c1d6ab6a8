// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types shared by the SDK and the server.

use thiserror::Error;

/// Validation and decoding failures for core analytics types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
	#[error("invalid event name: {0}")]
	InvalidEventName(String),

	#[error("invalid identifier: {0}")]
	InvalidIdentifier(String),

	#[error("event has neither userId nor anonymousId")]
	MissingIdentity,

	#[error("properties too large: {0} bytes (max {1})")]
	PropertiesTooLarge(usize, usize),

	#[error("invalid time window '{0}': expected '<N>d' or '<N>h' with N > 0")]
	InvalidTimeWindow(String),

	#[error("serialization error: {0}")]
	Serialization(String),
}

impl From<serde_json::Error> for CoreError {
	fn from(err: serde_json::Error) -> Self {
		CoreError::Serialization(err.to_string())
	}
}

/// A specialized `Result` type for core analytics operations.
pub type Result<T> = std::result::Result<T, CoreError>;
