// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, Json};
use tracing::{error, instrument};
use waypoint_analytics_core::{IngestBatchRequest, TenantId};

use super::{error_response, AnalyticsState};
use crate::error::IngestError;
use crate::ingest::ingest_batch;

#[instrument(skip(state, payload), fields(tenant_id = %tenant_id, items = payload.batch.len()))]
pub async fn ingest_events_impl(
	state: Arc<AnalyticsState>,
	tenant_id: TenantId,
	payload: IngestBatchRequest,
) -> impl IntoResponse {
	match ingest_batch(state.store.as_ref(), &tenant_id, payload, state.max_batch_items).await {
		Ok(response) => (StatusCode::ACCEPTED, Json(response)).into_response(),
		Err(IngestError::InvalidBatch(message)) => {
			error_response(StatusCode::BAD_REQUEST, "invalid_batch", &message).into_response()
		}
		Err(IngestError::Store(e)) => {
			error!(error = %e, "failed to persist batch");
			error_response(
				StatusCode::SERVICE_UNAVAILABLE,
				"store_unavailable",
				"Event store unavailable",
			)
			.into_response()
		}
	}
}
