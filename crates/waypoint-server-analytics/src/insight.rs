// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Insight requests and the AI explainer.
//!
//! [`build_insight_request`] is a pure transform of a funnel result. The
//! explainer behind [`Explainer`] is opaque; any failure is reported as
//! [`InsightUnavailable`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use waypoint_analytics_core::{FunnelResult, InsightRequest, InsightResponse, InsightStep};

use crate::error::InsightUnavailable;

/// Default explainer deadline.
pub const DEFAULT_EXPLAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Path of the explain endpoint relative to the explainer base URL.
pub const EXPLAIN_FUNNEL_PATH: &str = "/api/v1/explain-funnel";

/// Shapes a funnel result for the explainer.
pub fn build_insight_request(
	result: &FunnelResult,
	segment: Option<BTreeMap<String, String>>,
) -> InsightRequest {
	InsightRequest {
		workflow_id: result.workflow_id.clone(),
		steps: result
			.steps
			.iter()
			.map(|step| InsightStep {
				name: step.name.clone(),
				event: step.event_name.clone(),
				position: step.position,
			})
			.collect(),
		counts: result.steps.iter().map(|step| step.user_count).collect(),
		time_window: result.time_window.to_string(),
		segment: segment.filter(|s| !s.is_empty()),
	}
}

#[async_trait]
pub trait Explainer: Send + Sync {
	async fn explain(
		&self,
		request: &InsightRequest,
		timeout: Duration,
	) -> Result<InsightResponse, InsightUnavailable>;
}

/// Calls a remote explainer over JSON/HTTP.
pub struct HttpExplainer {
	http_client: Client,
	base_url: String,
}

impl HttpExplainer {
	pub fn new(http_client: Client, base_url: impl Into<String>) -> Self {
		let base_url = base_url.into().trim_end_matches('/').to_string();
		Self {
			http_client,
			base_url,
		}
	}

	pub fn endpoint(&self) -> String {
		format!("{}{}", self.base_url, EXPLAIN_FUNNEL_PATH)
	}
}

#[async_trait]
impl Explainer for HttpExplainer {
	#[instrument(skip(self, request), fields(workflow_id = %request.workflow_id))]
	async fn explain(
		&self,
		request: &InsightRequest,
		timeout: Duration,
	) -> Result<InsightResponse, InsightUnavailable> {
		let response = self
			.http_client
			.post(self.endpoint())
			.timeout(timeout)
			.json(request)
			.send()
			.await
			.map_err(|e| {
				if e.is_timeout() {
					InsightUnavailable::new(format!("explainer timed out after {}ms", timeout.as_millis()))
				} else {
					InsightUnavailable::new(format!("explainer request failed: {e}"))
				}
			})?;

		let status = response.status();
		if !status.is_success() {
			return Err(InsightUnavailable::new(format!(
				"explainer returned {}",
				status.as_u16()
			)));
		}

		let insight = response
			.json::<InsightResponse>()
			.await
			.map_err(|e| InsightUnavailable::new(format!("malformed explainer response: {e}")))?;

		debug!(suggestions = insight.suggestions.len(), "explainer responded");
		Ok(insight)
	}
}

/// Runs `explainer` under `timeout`, giving up early if `cancel` fires.
pub async fn explain_with_cancel(
	explainer: &dyn Explainer,
	request: &InsightRequest,
	timeout: Duration,
	cancel: &CancellationToken,
) -> Result<InsightResponse, InsightUnavailable> {
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(InsightUnavailable::new("explain cancelled")),
		outcome = tokio::time::timeout(timeout, explainer.explain(request, timeout)) => {
			outcome.unwrap_or_else(|_| {
				Err(InsightUnavailable::new(format!(
					"explainer timed out after {}ms",
					timeout.as_millis()
				)))
			})
		}
	}
}
