// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Funnel reports: a funnel result plus an optional AI insight.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};
use waypoint_analytics_core::{FunnelResult, InsightResponse, TenantId, WorkflowId};

use crate::error::FunnelError;
use crate::funnel::FunnelEngine;
use crate::insight::{build_insight_request, explain_with_cancel, Explainer, DEFAULT_EXPLAIN_TIMEOUT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelReport {
	pub funnel: FunnelResult,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub insight: Option<InsightResponse>,
	/// Why `insight` is missing when one was asked for.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub insight_error: Option<String>,
}

pub struct FunnelService {
	engine: FunnelEngine,
	explainer: Option<Arc<dyn Explainer>>,
	insight_timeout: Duration,
}

impl FunnelService {
	pub fn new(engine: FunnelEngine) -> Self {
		Self {
			engine,
			explainer: None,
			insight_timeout: DEFAULT_EXPLAIN_TIMEOUT,
		}
	}

	pub fn with_explainer(mut self, explainer: Arc<dyn Explainer>, timeout: Duration) -> Self {
		self.explainer = Some(explainer);
		self.insight_timeout = timeout;
		self
	}

	pub fn engine(&self) -> &FunnelEngine {
		&self.engine
	}

	pub fn has_explainer(&self) -> bool {
		self.explainer.is_some()
	}

	pub async fn report(
		&self,
		workflow_id: &WorkflowId,
		tenant_id: &TenantId,
		time_window: &str,
		segment: Option<BTreeMap<String, String>>,
		explain: bool,
	) -> Result<FunnelReport, FunnelError> {
		self
			.report_with_cancel(
				workflow_id,
				tenant_id,
				time_window,
				segment,
				explain,
				&CancellationToken::new(),
			)
			.await
	}

	/// Computes the funnel and, if `explain` is set, asks the explainer about
	/// it. Explainer failures are recorded in `insight_error`; the funnel is
	/// still returned.
	#[instrument(skip(self, segment, cancel), fields(workflow_id = %workflow_id, tenant_id = %tenant_id))]
	pub async fn report_with_cancel(
		&self,
		workflow_id: &WorkflowId,
		tenant_id: &TenantId,
		time_window: &str,
		segment: Option<BTreeMap<String, String>>,
		explain: bool,
		cancel: &CancellationToken,
	) -> Result<FunnelReport, FunnelError> {
		let funnel = self
			.engine
			.analyze_funnel_with_cancel(workflow_id, tenant_id, time_window, cancel)
			.await?;

		if !explain {
			return Ok(FunnelReport {
				funnel,
				insight: None,
				insight_error: None,
			});
		}

		let Some(explainer) = &self.explainer else {
			return Ok(FunnelReport {
				funnel,
				insight: None,
				insight_error: Some("no explainer configured".to_string()),
			});
		};

		let request = build_insight_request(&funnel, segment);
		match explain_with_cancel(explainer.as_ref(), &request, self.insight_timeout, cancel).await {
			Ok(insight) => Ok(FunnelReport {
				funnel,
				insight: Some(insight),
				insight_error: None,
			}),
			Err(unavailable) => {
				warn!(reason = %unavailable.reason, "funnel insight unavailable");
				Ok(FunnelReport {
					funnel,
					insight: None,
					insight_error: Some(unavailable.reason),
				})
			}
		}
	}
}
