// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event store interface.
//!
//! The funnel engine and the ingestion path only talk to [`EventStore`]; the
//! SQLite implementation lives in [`sqlite`].

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use waypoint_analytics_core::{
	EventId, IdentifyRecord, TenantId, TrackedEvent, WorkflowDefinition, WorkflowId,
};

use crate::error::StoreResult;

pub use sqlite::{create_pool, create_pool_with_size, SqliteEventStore, DEFAULT_POOL_SIZE};

/// Persistence used by ingestion and funnel computation.
#[async_trait]
pub trait EventStore: Send + Sync {
	/// Persists an event and returns the identifier assigned to it.
	async fn append_event(&self, event: &TrackedEvent, tenant_id: &TenantId) -> StoreResult<EventId>;

	/// Stores traits for `(tenant, user_id)`. A record older than the stored
	/// one is ignored; equal timestamps overwrite.
	async fn upsert_identity(&self, record: &IdentifyRecord, tenant_id: &TenantId) -> StoreResult<()>;

	/// Distinct actors (`user_id`, else `anonymous_id`) that emitted
	/// `event_name` at or after `since`.
	async fn count_distinct_users(
		&self,
		tenant_id: &TenantId,
		event_name: &str,
		since: DateTime<Utc>,
	) -> StoreResult<u64>;

	async fn get_workflow(
		&self,
		workflow_id: &WorkflowId,
		tenant_id: &TenantId,
	) -> StoreResult<Option<WorkflowDefinition>>;
}
