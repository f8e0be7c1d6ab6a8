// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP routes for ingestion and funnel reports.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
	extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
	http::{HeaderMap, StatusCode},
	response::IntoResponse,
	routing::{get, post},
	Json, Router,
};
use waypoint_analytics_core::{IngestBatchRequest, WorkflowId, MAX_BATCH_BODY_BYTES};

use crate::handlers::events::ingest_events_impl;
use crate::handlers::funnel::{funnel_report_impl, FunnelQuery};
use crate::handlers::health::{health, ready};
use crate::handlers::{error_response, AnalyticsState};
use crate::tenant::authenticate;

pub fn router(state: Arc<AnalyticsState>) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/ready", get(ready))
		.route(
			"/api/v1/events",
			post(ingest_events).layer(DefaultBodyLimit::max(MAX_BATCH_BODY_BYTES)),
		)
		.route("/api/v1/workflows/{workflow_id}/funnel", get(funnel_report))
		.with_state(state)
}

#[tracing::instrument(skip_all)]
async fn ingest_events(
	State(state): State<Arc<AnalyticsState>>,
	headers: HeaderMap,
	payload: Result<Json<IngestBatchRequest>, JsonRejection>,
) -> impl IntoResponse {
	let tenant_id = match authenticate(&headers, state.tenants.as_ref()) {
		Ok(tenant_id) => tenant_id,
		Err(e) => return e.into_response(),
	};

	let Json(payload) = match payload {
		Ok(payload) => payload,
		Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
			return error_response(
				StatusCode::PAYLOAD_TOO_LARGE,
				"batch_too_large",
				&format!("request body exceeds {MAX_BATCH_BODY_BYTES} bytes"),
			)
			.into_response()
		}
		Err(rejection) => {
			return error_response(
				StatusCode::BAD_REQUEST,
				"invalid_batch",
				&rejection.body_text(),
			)
			.into_response()
		}
	};

	ingest_events_impl(state, tenant_id, payload)
		.await
		.into_response()
}

#[tracing::instrument(skip_all, fields(workflow_id = %workflow_id))]
async fn funnel_report(
	State(state): State<Arc<AnalyticsState>>,
	Path(workflow_id): Path<String>,
	Query(params): Query<HashMap<String, String>>,
	headers: HeaderMap,
) -> impl IntoResponse {
	let tenant_id = match authenticate(&headers, state.tenants.as_ref()) {
		Ok(tenant_id) => tenant_id,
		Err(e) => return e.into_response(),
	};

	let query = match FunnelQuery::from_params(params) {
		Ok(query) => query,
		Err(message) => {
			return error_response(StatusCode::BAD_REQUEST, "invalid_query", &message).into_response()
		}
	};

	funnel_report_impl(state, tenant_id, WorkflowId::new(workflow_id), query)
		.await
		.into_response()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::funnel::{FunnelEngine, FunnelSettings};
	use crate::report::FunnelService;
	use crate::store::sqlite::tests::memory_store;
	use crate::store::SqliteEventStore;
	use crate::tenant::StaticTenantResolver;
	use axum::body::Body;
	use axum::http::Request;
	use serde_json::{json, Value};
	use tower::ServiceExt;
	use waypoint_analytics_core::{FunnelStepDefinition, TenantId, WorkflowDefinition};

	async fn create_test_app() -> (Router, Arc<SqliteEventStore>) {
		let store = Arc::new(memory_store().await);
		let tenants = StaticTenantResolver::default()
			.with_key("wp_acme", "acme")
			.with_key("wp_globex", "globex");
		let engine = FunnelEngine::new(store.clone(), FunnelSettings::default());
		let state = AnalyticsState::new(store.clone(), FunnelService::new(engine), Arc::new(tenants))
			.with_max_batch_items(5);
		(router(Arc::new(state)), store)
	}

	async fn body_json(response: axum::response::Response) -> Value {
		let body = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		serde_json::from_slice(&body).unwrap()
	}

	fn post_events(api_key: Option<&str>, body: Value) -> Request<Body> {
		let mut builder = Request::builder()
			.method("POST")
			.uri("/api/v1/events")
			.header("Content-Type", "application/json");
		if let Some(key) = api_key {
			builder = builder.header("x-api-key", key);
		}
		builder.body(Body::from(body.to_string())).unwrap()
	}

	fn get_funnel(api_key: &str, uri: &str) -> Request<Body> {
		Request::builder()
			.uri(uri)
			.header("x-api-key", api_key)
			.body(Body::empty())
			.unwrap()
	}

	fn track(name: &str, anon: &str) -> Value {
		json!({
			"type": "track",
			"name": name,
			"anonymousId": anon,
			"timestamp": chrono::Utc::now().to_rfc3339(),
			"context": {"sessionId": "session-1"}
		})
	}

	async fn seed_onboarding(store: &SqliteEventStore, tenant: &str) {
		store
			.save_workflow(&WorkflowDefinition {
				id: WorkflowId::new("onboarding"),
				tenant_id: TenantId::new(tenant),
				name: "Onboarding".to_string(),
				steps: vec![
					FunnelStepDefinition::new(1, "visit"),
					FunnelStepDefinition::new(2, "signup").with_label("Signed up"),
				],
			})
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn health_and_ready() {
		let (app, _) = create_test_app().await;

		let response = app
			.clone()
			.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(body_json(response).await, json!({"status": "ok"}));

		let response = app
			.oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(body_json(response).await, json!({"ready": true}));
	}

	#[tokio::test]
	async fn ingest_accepts_batch() {
		let (app, _) = create_test_app().await;

		let response = app
			.oneshot(post_events(
				Some("wp_acme"),
				json!({"batch": [track("visit", "a"), track("visit", "b")]}),
			))
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::ACCEPTED);
		let body = body_json(response).await;
		assert_eq!(body["status"], "accepted");
		assert_eq!(body["eventCount"], 2);
		assert!(body["queuedId"].is_string());
	}

	#[tokio::test]
	async fn ingest_requires_known_api_key() {
		let (app, _) = create_test_app().await;
		let batch = json!({"batch": [track("visit", "a")]});

		let response = app
			.clone()
			.oneshot(post_events(None, batch.clone()))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(body_json(response).await["error"], "missing_api_key");

		let response = app
			.oneshot(post_events(Some("wp_unknown"), batch))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(body_json(response).await["error"], "invalid_api_key");
	}

	#[tokio::test]
	async fn ingest_rejects_invalid_batches() {
		let (app, _) = create_test_app().await;

		let response = app
			.clone()
			.oneshot(post_events(
				Some("wp_acme"),
				json!({"batch": [track("visit", "a"), track("bad/name", "b")]}),
			))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		let body = body_json(response).await;
		assert_eq!(body["error"], "invalid_batch");
		assert!(body["message"].as_str().unwrap().contains("item 1"));

		let oversized: Vec<Value> = (0..6).map(|i| track("visit", &format!("a{i}"))).collect();
		let response = app
			.clone()
			.oneshot(post_events(Some("wp_acme"), json!({ "batch": oversized })))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);

		let response = app
			.oneshot(post_events(Some("wp_acme"), json!({"events": []})))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(body_json(response).await["error"], "invalid_batch");
	}

	#[tokio::test]
	async fn ingest_rejects_body_over_size_limit() {
		let (app, _) = create_test_app().await;

		let mut item = track("visit", "a");
		item["properties"] = json!({"padding": "x".repeat(MAX_BATCH_BODY_BYTES)});
		let response = app
			.oneshot(post_events(Some("wp_acme"), json!({ "batch": [item] })))
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
		assert_eq!(body_json(response).await["error"], "batch_too_large");
	}

	#[tokio::test]
	async fn funnel_report_after_ingest() {
		let (app, store) = create_test_app().await;
		seed_onboarding(&store, "acme").await;

		let response = app
			.clone()
			.oneshot(post_events(
				Some("wp_acme"),
				json!({"batch": [
					track("visit", "a"),
					track("visit", "b"),
					track("visit", "c"),
					track("visit", "d"),
					track("signup", "a"),
				]}),
			))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::ACCEPTED);

		let response = app
			.oneshot(get_funnel(
				"wp_acme",
				"/api/v1/workflows/onboarding/funnel?timeWindow=24h",
			))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);

		let body = body_json(response).await;
		let funnel = &body["funnel"];
		assert_eq!(funnel["timeWindow"], "24h");
		assert_eq!(funnel["totalUsers"], 4);
		assert_eq!(funnel["steps"][1]["name"], "Signed up");
		assert_eq!(funnel["steps"][1]["userCount"], 1);
		assert_eq!(funnel["steps"][1]["dropOffPct"], 75.0);
		assert_eq!(funnel["overallConversionPct"], 25.0);
		assert!(body.get("insight").is_none());
	}

	#[tokio::test]
	async fn funnel_is_tenant_scoped() {
		let (app, store) = create_test_app().await;
		seed_onboarding(&store, "acme").await;

		let response = app
			.oneshot(get_funnel("wp_globex", "/api/v1/workflows/onboarding/funnel"))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
		assert_eq!(body_json(response).await["error"], "workflow_not_found");
	}

	#[tokio::test]
	async fn funnel_errors_map_to_statuses() {
		let (app, store) = create_test_app().await;
		seed_onboarding(&store, "acme").await;
		store
			.save_workflow(&WorkflowDefinition {
				id: WorkflowId::new("empty"),
				tenant_id: TenantId::new("acme"),
				name: "Empty".to_string(),
				steps: vec![],
			})
			.await
			.unwrap();

		let response = app
			.clone()
			.oneshot(get_funnel("wp_acme", "/api/v1/workflows/empty/funnel"))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

		let response = app
			.clone()
			.oneshot(get_funnel(
				"wp_acme",
				"/api/v1/workflows/onboarding/funnel?timeWindow=7w",
			))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(body_json(response).await["error"], "invalid_time_window");

		let response = app
			.oneshot(get_funnel(
				"wp_acme",
				"/api/v1/workflows/onboarding/funnel?explain=perhaps",
			))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(body_json(response).await["error"], "invalid_query");
	}

	#[tokio::test]
	async fn explain_without_explainer_still_reports() {
		let (app, store) = create_test_app().await;
		seed_onboarding(&store, "acme").await;

		let response = app
			.oneshot(get_funnel(
				"wp_acme",
				"/api/v1/workflows/onboarding/funnel?explain=true",
			))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let body = body_json(response).await;
		assert_eq!(body["insightError"], "no explainer configured");
		assert_eq!(body["funnel"]["totalUsers"], 0);
	}
}
