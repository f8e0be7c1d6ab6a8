// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Funnel engine.
//!
//! Each step is an independent distinct-user count over the window: a user
//! counted at step 3 need not appear at step 2. Counts can therefore grow
//! from one step to the next, giving a negative drop-off unless clamping is
//! enabled.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use waypoint_analytics_core::{
	FunnelResult, FunnelStepDefinition, FunnelStepResult, TenantId, TimeWindow, WorkflowId,
};

use crate::error::FunnelError;
use crate::store::EventStore;

#[derive(Debug, Clone)]
pub struct FunnelSettings {
	/// Clamp drop-off and overall conversion into `[0, 100]`.
	pub clamp_percentages: bool,
	/// Upper bound on each per-step store query.
	pub query_timeout: Duration,
}

impl Default for FunnelSettings {
	fn default() -> Self {
		Self {
			clamp_percentages: false,
			query_timeout: Duration::from_secs(10),
		}
	}
}

/// Nearest integer, halves rounded away from zero.
fn round_pct(value: f64) -> f64 {
	value.round()
}

/// Turns ordered per-step counts into a [`FunnelResult`].
///
/// `steps` must already be in funnel order.
pub fn compute_funnel(
	workflow_id: WorkflowId,
	time_window: TimeWindow,
	steps: &[(FunnelStepDefinition, u64)],
	clamp_percentages: bool,
) -> FunnelResult {
	let mut results = Vec::with_capacity(steps.len());
	let mut previous: Option<u64> = None;

	for (step, count) in steps {
		let drop_off = match previous {
			None | Some(0) => 0.0,
			Some(prev) => {
				let raw = round_pct((prev as f64 - *count as f64) / prev as f64 * 100.0);
				if clamp_percentages {
					raw.clamp(0.0, 100.0)
				} else {
					raw
				}
			}
		};

		results.push(FunnelStepResult {
			position: step.position,
			event_name: step.event_name.clone(),
			name: step.display_name().to_string(),
			user_count: *count,
			drop_off_pct: drop_off,
			conversion_from_previous_pct: 100.0 - drop_off,
		});
		previous = Some(*count);
	}

	let first = steps.first().map(|(_, count)| *count).unwrap_or(0);
	let last = steps.last().map(|(_, count)| *count).unwrap_or(0);
	let overall = if first > 0 {
		let raw = round_pct(last as f64 / first as f64 * 100.0);
		if clamp_percentages {
			raw.clamp(0.0, 100.0)
		} else {
			raw
		}
	} else {
		0.0
	};

	FunnelResult {
		workflow_id,
		time_window,
		steps: results,
		overall_conversion_pct: overall,
		total_users: first,
	}
}

/// Resolves workflows and computes funnels against an [`EventStore`].
pub struct FunnelEngine {
	store: Arc<dyn EventStore>,
	settings: FunnelSettings,
}

impl FunnelEngine {
	pub fn new(store: Arc<dyn EventStore>, settings: FunnelSettings) -> Self {
		Self { store, settings }
	}

	pub fn settings(&self) -> &FunnelSettings {
		&self.settings
	}

	/// Computes the funnel for `workflow_id` over the window ending now.
	pub async fn analyze_funnel(
		&self,
		workflow_id: &WorkflowId,
		tenant_id: &TenantId,
		time_window: &str,
	) -> Result<FunnelResult, FunnelError> {
		self
			.analyze_funnel_with_cancel(workflow_id, tenant_id, time_window, &CancellationToken::new())
			.await
	}

	/// As [`FunnelEngine::analyze_funnel`], abandoning all in-flight queries
	/// and returning [`FunnelError::Cancelled`] once `cancel` fires.
	#[instrument(skip(self, cancel), fields(workflow_id = %workflow_id, tenant_id = %tenant_id))]
	pub async fn analyze_funnel_with_cancel(
		&self,
		workflow_id: &WorkflowId,
		tenant_id: &TenantId,
		time_window: &str,
		cancel: &CancellationToken,
	) -> Result<FunnelResult, FunnelError> {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => {
				debug!("funnel computation cancelled");
				Err(FunnelError::Cancelled)
			}
			result = self.compute(workflow_id, tenant_id, time_window, Utc::now()) => result,
		}
	}

	async fn compute(
		&self,
		workflow_id: &WorkflowId,
		tenant_id: &TenantId,
		time_window: &str,
		now: DateTime<Utc>,
	) -> Result<FunnelResult, FunnelError> {
		let workflow = self
			.store
			.get_workflow(workflow_id, tenant_id)
			.await?
			.ok_or_else(|| FunnelError::WorkflowNotFound(workflow_id.clone()))?;

		let steps = workflow.ordered_steps();
		if steps.is_empty() {
			return Err(FunnelError::EmptyWorkflow(workflow_id.clone()));
		}

		let window = TimeWindow::parse(time_window).map_err(FunnelError::InvalidTimeWindow)?;
		let since = window.since(now);

		let counts = try_join_all(
			steps
				.iter()
				.map(|step| self.count_step(tenant_id, &step.event_name, since)),
		)
		.await?;

		debug!(steps = steps.len(), ?counts, "funnel step counts collected");

		let paired: Vec<(FunnelStepDefinition, u64)> = steps.into_iter().zip(counts).collect();
		Ok(compute_funnel(
			workflow_id.clone(),
			window,
			&paired,
			self.settings.clamp_percentages,
		))
	}

	async fn count_step(
		&self,
		tenant_id: &TenantId,
		event_name: &str,
		since: DateTime<Utc>,
	) -> Result<u64, FunnelError> {
		let query = self.store.count_distinct_users(tenant_id, event_name, since);
		match tokio::time::timeout(self.settings.query_timeout, query).await {
			Ok(result) => Ok(result?),
			Err(_) => {
				warn!(
					event_name,
					timeout_ms = self.settings.query_timeout.as_millis() as u64,
					"funnel step query timed out"
				);
				Err(FunnelError::StoreUnavailable(format!(
					"count for '{event_name}' timed out"
				)))
			}
		}
	}
}
