// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batch transport: delivers one batch to the ingestion endpoint.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use waypoint_analytics_core::{BatchEntry, IngestBatchRequest, IngestResponse};
use waypoint_common_http::RetryConfig;

use crate::error::{AnalyticsError, Result};

/// Header carrying the tenant API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Path of the ingestion endpoint relative to the server base URL.
pub const EVENTS_PATH: &str = "/api/v1/events";

/// Sends a batch over the wire. Implementations hold no per-batch state;
/// the queue decides what to do with a failure.
#[async_trait]
pub trait BatchTransport: Send + Sync {
	async fn send(
		&self,
		endpoint: &str,
		batch: &[BatchEntry],
		api_key: &str,
	) -> Result<IngestResponse>;
}

/// JSON-over-HTTP transport with bounded in-request retries.
pub struct HttpBatchTransport {
	http_client: Client,
	retry_config: RetryConfig,
}

impl HttpBatchTransport {
	pub fn new(http_client: Client, retry_config: RetryConfig) -> Self {
		Self {
			http_client,
			retry_config,
		}
	}

	async fn post_once(
		&self,
		endpoint: &str,
		body: &IngestBatchRequest,
		api_key: &str,
	) -> Result<IngestResponse> {
		let response = self
			.http_client
			.post(endpoint)
			.header(API_KEY_HEADER, api_key)
			.json(body)
			.send()
			.await?;

		let status = response.status();
		if status == StatusCode::TOO_MANY_REQUESTS {
			let retry_after_secs = response
				.headers()
				.get(reqwest::header::RETRY_AFTER)
				.and_then(|v| v.to_str().ok())
				.and_then(|s| s.parse().ok());
			return Err(AnalyticsError::RateLimited { retry_after_secs });
		}

		if !status.is_success() {
			return Err(AnalyticsError::ServerError {
				status: status.as_u16(),
				message: response.text().await.unwrap_or_default(),
			});
		}

		let text = response.text().await?;
		match serde_json::from_str::<IngestResponse>(&text) {
			Ok(accepted) => Ok(accepted),
			Err(e) => {
				// A 2xx is a delivery even if the body is not what we expect.
				warn!(error = %e, "unrecognised ingestion response body");
				Ok(IngestResponse {
					status: "accepted".to_string(),
					event_count: body.batch.len(),
					queued_id: String::new(),
				})
			}
		}
	}
}

#[async_trait]
impl BatchTransport for HttpBatchTransport {
	async fn send(
		&self,
		endpoint: &str,
		batch: &[BatchEntry],
		api_key: &str,
	) -> Result<IngestResponse> {
		let body = IngestBatchRequest {
			batch: batch.iter().map(BatchEntry::to_wire).collect(),
		};

		debug!(endpoint, count = body.batch.len(), "sending analytics batch");

		waypoint_common_http::retry(&self.retry_config, || {
			self.post_once(endpoint, &body, api_key)
		})
		.await
	}
}
