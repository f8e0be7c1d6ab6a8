// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod events;
pub mod funnel;
pub mod health;

use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, Json};
use waypoint_analytics_core::ErrorResponse;

use crate::ingest::DEFAULT_MAX_BATCH_ITEMS;
use crate::report::FunnelService;
use crate::store::EventStore;
use crate::tenant::TenantResolver;

/// Shared state behind every analytics route.
pub struct AnalyticsState {
	pub store: Arc<dyn EventStore>,
	pub funnels: FunnelService,
	pub tenants: Arc<dyn TenantResolver>,
	pub max_batch_items: usize,
}

impl AnalyticsState {
	pub fn new(
		store: Arc<dyn EventStore>,
		funnels: FunnelService,
		tenants: Arc<dyn TenantResolver>,
	) -> Self {
		Self {
			store,
			funnels,
			tenants,
			max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
		}
	}

	pub fn with_max_batch_items(mut self, max: usize) -> Self {
		self.max_batch_items = max.max(1);
		self
	}
}

pub(crate) fn error_response(status: StatusCode, error: &str, message: &str) -> impl IntoResponse {
	(
		status,
		Json(ErrorResponse {
			error: error.to_string(),
			message: message.to_string(),
		}),
	)
}
