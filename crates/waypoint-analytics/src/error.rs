// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics SDK.

use reqwest::StatusCode;
use thiserror::Error;
use waypoint_analytics_core::CoreError;
use waypoint_common_http::{is_retryable_status, RetryableError};

/// Analytics SDK errors.
///
/// `RequestFailed`, `ServerError` and `RateLimited` are transport failures:
/// the queue puts the batch back and tries again on the next trigger, so they
/// never reach callers of `track()`.
#[derive(Debug, Error)]
pub enum AnalyticsError {
	/// API key is missing or empty.
	#[error("invalid API key: must be non-empty")]
	InvalidApiKey,

	/// Base URL is missing or not http(s).
	#[error("invalid base URL: {0}")]
	InvalidBaseUrl(String),

	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Ingestion endpoint answered with a non-2xx status.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	#[error("rate limited, retry after {retry_after_secs:?} seconds")]
	RateLimited { retry_after_secs: Option<u64> },

	#[error("client has been shut down")]
	ClientShutdown,

	#[error("event validation failed: {0}")]
	ValidationFailed(String),

	#[error("serialization error: {0}")]
	SerializationError(String),
}

impl AnalyticsError {
	pub fn is_transport_failure(&self) -> bool {
		matches!(
			self,
			AnalyticsError::RequestFailed(_)
				| AnalyticsError::ServerError { .. }
				| AnalyticsError::RateLimited { .. }
		)
	}
}

impl From<CoreError> for AnalyticsError {
	fn from(err: CoreError) -> Self {
		match err {
			CoreError::Serialization(msg) => AnalyticsError::SerializationError(msg),
			other => AnalyticsError::ValidationFailed(other.to_string()),
		}
	}
}

impl RetryableError for AnalyticsError {
	fn is_retryable(&self) -> bool {
		match self {
			AnalyticsError::RequestFailed(e) => e.is_retryable(),
			AnalyticsError::ServerError { status, .. } => StatusCode::from_u16(*status)
				.map(is_retryable_status)
				.unwrap_or(false),
			AnalyticsError::RateLimited { .. } => true,
			_ => false,
		}
	}
}

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn gateway_and_throttle_statuses_are_retryable() {
		for status in [408, 429, 500, 502, 503, 504] {
			let err = AnalyticsError::ServerError {
				status,
				message: String::new(),
			};
			assert!(err.is_retryable(), "{status} should be retryable");
			assert!(err.is_transport_failure());
		}
	}

	#[test]
	fn client_errors_are_not_retryable() {
		for status in [400, 401, 403, 404, 413, 422] {
			let err = AnalyticsError::ServerError {
				status,
				message: String::new(),
			};
			assert!(!err.is_retryable(), "{status} should not be retryable");
		}
	}

	#[test]
	fn server_error_retry_follows_shared_status_list() {
		for code in 100u16..600 {
			let err = AnalyticsError::ServerError {
				status: code,
				message: String::new(),
			};
			let expected = StatusCode::from_u16(code).is_ok_and(is_retryable_status);
			assert_eq!(err.is_retryable(), expected, "status {code}");
		}
	}

	#[test]
	fn caller_misuse_is_not_a_transport_failure() {
		assert!(!AnalyticsError::ClientShutdown.is_transport_failure());
		assert!(!AnalyticsError::ValidationFailed("x".into()).is_transport_failure());
		assert!(!AnalyticsError::InvalidApiKey.is_retryable());
	}

	#[test]
	fn core_errors_map_to_validation_failures() {
		let err: AnalyticsError = CoreError::InvalidEventName("bad/name".into()).into();
		assert!(matches!(err, AnalyticsError::ValidationFailed(msg) if msg.contains("bad/name")));
	}
}
