// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, Json};
use tracing::{error, instrument};
use waypoint_analytics_core::{TenantId, WorkflowId};

use super::{error_response, AnalyticsState};
use crate::error::FunnelError;

pub const DEFAULT_TIME_WINDOW: &str = "7d";

/// Query prefix for segment filters, e.g. `segment.country=NZ`.
const SEGMENT_PREFIX: &str = "segment.";

/// Parsed query string of the funnel endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelQuery {
	pub time_window: String,
	pub explain: bool,
	pub segment: Option<BTreeMap<String, String>>,
}

impl FunnelQuery {
	pub fn from_params(params: HashMap<String, String>) -> Result<Self, String> {
		let mut time_window = DEFAULT_TIME_WINDOW.to_string();
		let mut explain = false;
		let mut segment = BTreeMap::new();

		for (key, value) in params {
			match key.as_str() {
				"timeWindow" => time_window = value,
				"explain" => {
					explain = match value.as_str() {
						"true" | "1" => true,
						"false" | "0" => false,
						other => return Err(format!("explain must be true or false, got {other:?}")),
					}
				}
				_ => {
					if let Some(name) = key.strip_prefix(SEGMENT_PREFIX) {
						if !name.is_empty() {
							segment.insert(name.to_string(), value);
						}
					}
				}
			}
		}

		Ok(Self {
			time_window,
			explain,
			segment: (!segment.is_empty()).then_some(segment),
		})
	}
}

#[instrument(skip(state, query), fields(tenant_id = %tenant_id, workflow_id = %workflow_id))]
pub async fn funnel_report_impl(
	state: Arc<AnalyticsState>,
	tenant_id: TenantId,
	workflow_id: WorkflowId,
	query: FunnelQuery,
) -> impl IntoResponse {
	let result = state
		.funnels
		.report(
			&workflow_id,
			&tenant_id,
			&query.time_window,
			query.segment,
			query.explain,
		)
		.await;

	match result {
		Ok(report) => (StatusCode::OK, Json(report)).into_response(),
		Err(e) => funnel_error_response(e).into_response(),
	}
}

fn funnel_error_response(err: FunnelError) -> impl IntoResponse {
	let message = err.to_string();
	match err {
		FunnelError::WorkflowNotFound(_) => {
			error_response(StatusCode::NOT_FOUND, "workflow_not_found", &message)
		}
		FunnelError::EmptyWorkflow(_) => {
			error_response(StatusCode::UNPROCESSABLE_ENTITY, "empty_workflow", &message)
		}
		FunnelError::InvalidTimeWindow(_) => {
			error_response(StatusCode::BAD_REQUEST, "invalid_time_window", &message)
		}
		FunnelError::StoreUnavailable(_) => {
			error!(error = %message, "funnel computation failed");
			error_response(
				StatusCode::SERVICE_UNAVAILABLE,
				"store_unavailable",
				"Event store unavailable",
			)
		}
		FunnelError::Cancelled => error_response(
			StatusCode::SERVICE_UNAVAILABLE,
			"cancelled",
			"Funnel computation was cancelled",
		),
	}
}
