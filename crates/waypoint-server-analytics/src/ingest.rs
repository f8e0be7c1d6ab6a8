// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batch ingestion.

use tracing::{debug, instrument};
use waypoint_analytics_core::{BatchEntry, IngestBatchRequest, IngestResponse, TenantId};

use crate::error::IngestError;
use crate::store::EventStore;

/// Default cap on items per ingestion batch, the same cap the SDK chunks to.
pub const DEFAULT_MAX_BATCH_ITEMS: usize = waypoint_analytics_core::DEFAULT_MAX_BATCH_ITEMS;

/// Validates every item, then persists them in batch order.
///
/// Nothing is written if any item is invalid. A store failure part-way
/// through leaves the earlier items persisted; clients resend the whole
/// batch, so counts are distinct-user based and tolerate the duplicates.
#[instrument(skip(store, request), fields(tenant_id = %tenant_id, items = request.batch.len()))]
pub async fn ingest_batch(
	store: &dyn EventStore,
	tenant_id: &TenantId,
	request: IngestBatchRequest,
	max_items: usize,
) -> Result<IngestResponse, IngestError> {
	if request.batch.is_empty() {
		return Err(IngestError::InvalidBatch("batch is empty".to_string()));
	}
	if request.batch.len() > max_items {
		return Err(IngestError::InvalidBatch(format!(
			"batch has {} items, limit is {max_items}",
			request.batch.len()
		)));
	}

	let entries = request
		.batch
		.into_iter()
		.enumerate()
		.map(|(index, item)| {
			BatchEntry::try_from(item)
				.map_err(|e| IngestError::InvalidBatch(format!("item {index}: {e}")))
		})
		.collect::<Result<Vec<_>, _>>()?;

	for entry in &entries {
		match entry {
			BatchEntry::Track(event) => {
				store.append_event(event, tenant_id).await?;
			}
			BatchEntry::Identify(record) => {
				store.upsert_identity(record, tenant_id).await?;
			}
		}
	}

	let response = IngestResponse::accepted(entries.len());
	debug!(queued_id = %response.queued_id, "batch ingested");
	Ok(response)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::sqlite::tests::memory_store;
	use chrono::{Duration, Utc};
	use crate::store::SqliteEventStore;
	use async_trait::async_trait;
	use serde_json::json;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Arc;
	use waypoint_analytics::{
		AnalyticsError, BatchTransport, EventQueue, FlushOutcome, Properties, QueueConfig,
		QueueTarget, RetryConfig,
	};
	use waypoint_analytics_core::{BatchItem, IdentifyRecord, TrackedEvent};

	fn track(name: &str, anon: &str) -> BatchItem {
		BatchEntry::Track(TrackedEvent::new(name, anon).with_session_id("session-1")).to_wire()
	}

	#[tokio::test]
	async fn persists_tracks_and_identities() {
		let store = memory_store().await;
		let tenant = TenantId::new("acme");
		let request = IngestBatchRequest {
			batch: vec![
				track("visit", "anon-1"),
				track("visit", "anon-2"),
				BatchEntry::Identify(
					IdentifyRecord::new("user-1")
						.with_anonymous_id("anon-1")
						.with_traits(json!({"plan": "pro"})),
				)
				.to_wire(),
			],
		};

		let response = ingest_batch(&store, &tenant, request, DEFAULT_MAX_BATCH_ITEMS)
			.await
			.unwrap();

		assert_eq!(response.status, "accepted");
		assert_eq!(response.event_count, 3);
		let since = Utc::now() - Duration::hours(1);
		assert_eq!(store.count_distinct_users(&tenant, "visit", since).await.unwrap(), 2);
		let identity = store.get_identity(&tenant, "user-1").await.unwrap().unwrap();
		assert_eq!(identity.traits["plan"], "pro");
	}

	#[tokio::test]
	async fn one_invalid_item_rejects_whole_batch() {
		let store = memory_store().await;
		let tenant = TenantId::new("acme");
		let mut bad = TrackedEvent::new("visit", "anon-3");
		bad.event_name = "   ".to_string();
		let request = IngestBatchRequest {
			batch: vec![track("visit", "anon-1"), BatchEntry::Track(bad).to_wire()],
		};

		let err = ingest_batch(&store, &tenant, request, DEFAULT_MAX_BATCH_ITEMS)
			.await
			.unwrap_err();

		match err {
			IngestError::InvalidBatch(message) => assert!(message.starts_with("item 1:")),
			other => panic!("unexpected error: {other:?}"),
		}
		let since = Utc::now() - Duration::hours(1);
		assert_eq!(store.count_distinct_users(&tenant, "visit", since).await.unwrap(), 0);
	}

	#[tokio::test]
	async fn rejects_empty_and_oversized_batches() {
		let store = memory_store().await;
		let tenant = TenantId::new("acme");

		let err = ingest_batch(&store, &tenant, IngestBatchRequest { batch: vec![] }, 10)
			.await
			.unwrap_err();
		assert!(matches!(err, IngestError::InvalidBatch(_)));

		let batch = (0..3).map(|i| track("visit", &format!("anon-{i}"))).collect();
		let err = ingest_batch(&store, &tenant, IngestBatchRequest { batch }, 2)
			.await
			.unwrap_err();
		assert!(err.to_string().contains("limit is 2"));
	}

	#[tokio::test]
	async fn item_without_identity_is_rejected() {
		let store = memory_store().await;
		let mut anonymous = TrackedEvent::new("visit", "anon-1");
		anonymous.anonymous_id = None;
		let request = IngestBatchRequest {
			batch: vec![BatchEntry::Track(anonymous).to_wire()],
		};

		let err = ingest_batch(&store, &TenantId::new("acme"), request, DEFAULT_MAX_BATCH_ITEMS)
			.await
			.unwrap_err();
		assert!(matches!(err, IngestError::InvalidBatch(_)));
	}

	/// Delivers SDK batches straight into `ingest_batch`, failing while
	/// `outage` is set.
	struct InProcessTransport {
		store: Arc<SqliteEventStore>,
		tenant: TenantId,
		outage: AtomicBool,
	}

	#[async_trait]
	impl BatchTransport for InProcessTransport {
		async fn send(
			&self,
			_endpoint: &str,
			batch: &[BatchEntry],
			_api_key: &str,
		) -> waypoint_analytics::Result<IngestResponse> {
			if self.outage.load(Ordering::SeqCst) {
				return Err(AnalyticsError::ServerError {
					status: 503,
					message: "unavailable".to_string(),
				});
			}
			let request = IngestBatchRequest {
				batch: batch.iter().map(BatchEntry::to_wire).collect(),
			};
			ingest_batch(self.store.as_ref(), &self.tenant, request, DEFAULT_MAX_BATCH_ITEMS)
				.await
				.map_err(|e| AnalyticsError::ServerError {
					status: 400,
					message: e.to_string(),
				})
		}
	}

	#[tokio::test]
	async fn sdk_backlog_is_ingested_after_outage() {
		let store = Arc::new(memory_store().await);
		let tenant = TenantId::new("acme");
		let transport = Arc::new(InProcessTransport {
			store: store.clone(),
			tenant: tenant.clone(),
			outage: AtomicBool::new(false),
		});
		let queue = EventQueue::new(
			QueueConfig::default(),
			RetryConfig::no_retry(),
			QueueTarget {
				endpoint: "http://localhost/api/v1/events".to_string(),
				api_key: "wp_acme".to_string(),
			},
			transport.clone(),
		);

		for i in 0..10 {
			queue.track(&format!("step_{i}"), Properties::new()).await.unwrap();
		}
		transport.outage.store(true, Ordering::SeqCst);
		assert!(matches!(queue.flush().await, FlushOutcome::Requeued { count: 10, .. }));

		for i in 10..110 {
			queue.track(&format!("step_{i}"), Properties::new()).await.unwrap();
		}
		transport.outage.store(false, Ordering::SeqCst);
		let outcome = queue.flush().await;
		assert!(matches!(outcome, FlushOutcome::Delivered { count: 110, .. }), "{outcome:?}");
		assert!(queue.is_empty().await);

		let since = Utc::now() - Duration::hours(1);
		for name in ["step_0", "step_99", "step_109"] {
			assert_eq!(store.count_distinct_users(&tenant, name, since).await.unwrap(), 1);
		}
	}
}
