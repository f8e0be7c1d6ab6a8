// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Wiring from resolved configuration to a running router.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use waypoint_server_analytics::{
	create_pool_with_size, router, AnalyticsState, FunnelEngine, FunnelService, FunnelSettings,
	HttpExplainer, SqliteEventStore, StaticTenantResolver, TenantId,
};
use waypoint_server_config::ServerConfig;

/// Opens the event store, ensures its schema and builds the shared state.
pub async fn create_app_state(config: &ServerConfig) -> anyhow::Result<Arc<AnalyticsState>> {
	let pool = create_pool_with_size(&config.database.url, config.database.pool_size())
		.await
		.with_context(|| format!("failed to open database {}", config.database.url))?;
	let store = Arc::new(SqliteEventStore::new(pool));
	store
		.ensure_schema()
		.await
		.context("failed to create event store schema")?;

	let engine = FunnelEngine::new(
		store.clone(),
		FunnelSettings {
			clamp_percentages: config.funnel.clamp_percentages,
			query_timeout: config.funnel.query_timeout(),
		},
	);

	let mut funnels = FunnelService::new(engine);
	if let Some(url) = &config.insight.explainer_url {
		let http_client = waypoint_common_http::builder()
			.build()
			.context("failed to build explainer HTTP client")?;
		funnels = funnels.with_explainer(
			Arc::new(HttpExplainer::new(http_client, url.clone())),
			config.insight.timeout(),
		);
		tracing::info!(explainer_url = %url, "funnel explainer enabled");
	}

	let keys: HashMap<String, TenantId> = config
		.ingest
		.api_keys
		.iter()
		.map(|(key, tenant)| (key.clone(), TenantId::new(tenant.clone())))
		.collect();
	if keys.is_empty() {
		tracing::warn!("no ingest API keys configured, every request will be rejected");
	}
	let tenants = StaticTenantResolver::new(keys);

	let state = AnalyticsState::new(store, funnels, Arc::new(tenants))
		.with_max_batch_items(config.ingest.max_batch_items);
	Ok(Arc::new(state))
}

/// The analytics router with request tracing and permissive CORS.
pub fn create_router(state: Arc<AnalyticsState>) -> Router {
	router(state).layer(TraceLayer::new_for_http()).layer(
		CorsLayer::new()
			.allow_origin(Any)
			.allow_methods(Any)
			.allow_headers(Any),
	)
}
