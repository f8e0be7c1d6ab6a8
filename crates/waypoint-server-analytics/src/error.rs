// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics server.

use thiserror::Error;
use waypoint_analytics_core::{CoreError, WorkflowId};

/// Event store failures. Retrying is up to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("corrupt row: {0}")]
	Corrupt(String),

	#[error("store unavailable: {0}")]
	Unavailable(String),
}

/// Funnel computation failures.
#[derive(Debug, Error)]
pub enum FunnelError {
	#[error("workflow not found: {0}")]
	WorkflowNotFound(WorkflowId),

	#[error("workflow has no steps: {0}")]
	EmptyWorkflow(WorkflowId),

	#[error(transparent)]
	InvalidTimeWindow(CoreError),

	#[error("event store unavailable: {0}")]
	StoreUnavailable(String),

	#[error("funnel computation cancelled")]
	Cancelled,
}

impl FunnelError {
	/// Whether the same request may succeed later.
	pub fn is_retryable(&self) -> bool {
		matches!(self, FunnelError::StoreUnavailable(_))
	}
}

impl From<StoreError> for FunnelError {
	fn from(err: StoreError) -> Self {
		FunnelError::StoreUnavailable(err.to_string())
	}
}

/// The explainer could not produce an insight. Never fatal to a funnel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("insight unavailable: {reason}")]
pub struct InsightUnavailable {
	pub reason: String,
}

impl InsightUnavailable {
	pub fn new(reason: impl Into<String>) -> Self {
		Self {
			reason: reason.into(),
		}
	}
}

/// Ingestion failures.
#[derive(Debug, Error)]
pub enum IngestError {
	#[error("invalid batch: {0}")]
	InvalidBatch(String),

	#[error(transparent)]
	Store(#[from] StoreError),
}

/// A specialized `Result` type for event store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
