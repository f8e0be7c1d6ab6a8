// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite implementation of [`EventStore`].
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision and a `Z` suffix, so string comparison orders them correctly.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::instrument;
use waypoint_analytics_core::{
	EventId, FunnelStepDefinition, IdentifyRecord, TenantId, TrackedEvent, WorkflowDefinition,
	WorkflowId,
};

use super::EventStore;
use crate::error::{StoreError, StoreResult};

const SCHEMA: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS events (
		id TEXT PRIMARY KEY,
		tenant_id TEXT NOT NULL,
		event_name TEXT NOT NULL,
		user_id TEXT,
		anonymous_id TEXT,
		session_id TEXT,
		properties TEXT NOT NULL,
		context TEXT NOT NULL,
		timestamp TEXT NOT NULL,
		received_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE INDEX IF NOT EXISTS idx_events_tenant_name_ts
	ON events (tenant_id, event_name, timestamp)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS identities (
		tenant_id TEXT NOT NULL,
		user_id TEXT NOT NULL,
		anonymous_id TEXT,
		traits TEXT NOT NULL,
		timestamp TEXT NOT NULL,
		updated_at TEXT NOT NULL,
		PRIMARY KEY (tenant_id, user_id)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS workflows (
		tenant_id TEXT NOT NULL,
		id TEXT NOT NULL,
		name TEXT NOT NULL,
		created_at TEXT NOT NULL,
		PRIMARY KEY (tenant_id, id)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS workflow_steps (
		tenant_id TEXT NOT NULL,
		workflow_id TEXT NOT NULL,
		position INTEGER NOT NULL,
		event_name TEXT NOT NULL,
		label TEXT,
		PRIMARY KEY (tenant_id, workflow_id, position)
	)
	"#,
];

/// Pool size used by [`create_pool`] for file-backed stores.
pub const DEFAULT_POOL_SIZE: u32 = 8;

/// Creates a SQLite pool with WAL mode and [`DEFAULT_POOL_SIZE`] connections.
pub async fn create_pool(database_url: &str) -> StoreResult<SqlitePool> {
	create_pool_with_size(database_url, DEFAULT_POOL_SIZE).await
}

/// Creates a SQLite pool with WAL mode. In-memory databases get a single
/// connection regardless of `max_connections`, since each connection would
/// otherwise see its own database.
#[instrument(skip(database_url))]
pub async fn create_pool_with_size(
	database_url: &str,
	max_connections: u32,
) -> StoreResult<SqlitePool> {
	let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
	let mut options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
	if !in_memory {
		options = options
			.journal_mode(SqliteJournalMode::Wal)
			.synchronous(SqliteSynchronous::Normal);
	}

	let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
	if in_memory {
		pool_options = pool_options
			.max_connections(1)
			.idle_timeout(None)
			.max_lifetime(None);
	}
	let pool = pool_options.connect_with(options).await?;

	tracing::debug!(in_memory, max_connections, "database pool created");
	Ok(pool)
}

fn format_ts(ts: &DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str, column: &str) -> StoreResult<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| StoreError::Corrupt(format!("invalid {column}: {value}")))
}

#[derive(Clone)]
pub struct SqliteEventStore {
	pool: SqlitePool,
}

impl SqliteEventStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Creates any missing tables and indexes.
	#[instrument(skip(self))]
	pub async fn ensure_schema(&self) -> StoreResult<()> {
		for statement in SCHEMA {
			sqlx::query(statement).execute(&self.pool).await?;
		}
		Ok(())
	}

	/// Creates or replaces a workflow and its steps.
	#[instrument(skip(self, workflow), fields(workflow_id = %workflow.id, tenant_id = %workflow.tenant_id))]
	pub async fn save_workflow(&self, workflow: &WorkflowDefinition) -> StoreResult<()> {
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			INSERT INTO workflows (tenant_id, id, name, created_at)
			VALUES (?, ?, ?, ?)
			ON CONFLICT (tenant_id, id) DO UPDATE SET name = excluded.name
			"#,
		)
		.bind(workflow.tenant_id.as_str())
		.bind(workflow.id.as_str())
		.bind(&workflow.name)
		.bind(format_ts(&Utc::now()))
		.execute(&mut *tx)
		.await?;

		sqlx::query("DELETE FROM workflow_steps WHERE tenant_id = ? AND workflow_id = ?")
			.bind(workflow.tenant_id.as_str())
			.bind(workflow.id.as_str())
			.execute(&mut *tx)
			.await?;

		for step in &workflow.steps {
			sqlx::query(
				r#"
				INSERT INTO workflow_steps (tenant_id, workflow_id, position, event_name, label)
				VALUES (?, ?, ?, ?, ?)
				"#,
			)
			.bind(workflow.tenant_id.as_str())
			.bind(workflow.id.as_str())
			.bind(i64::from(step.position))
			.bind(&step.event_name)
			.bind(step.label.as_deref())
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;
		Ok(())
	}

	/// Latest identify record for a user, if any.
	#[instrument(skip(self), fields(tenant_id = %tenant_id))]
	pub async fn get_identity(
		&self,
		tenant_id: &TenantId,
		user_id: &str,
	) -> StoreResult<Option<IdentifyRecord>> {
		let row = sqlx::query_as::<_, IdentityRow>(
			r#"
			SELECT user_id, anonymous_id, traits, timestamp
			FROM identities
			WHERE tenant_id = ? AND user_id = ?
			"#,
		)
		.bind(tenant_id.as_str())
		.bind(user_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}
}

#[async_trait]
impl EventStore for SqliteEventStore {
	#[instrument(skip(self, event), fields(tenant_id = %tenant_id, event_name = %event.event_name))]
	async fn append_event(&self, event: &TrackedEvent, tenant_id: &TenantId) -> StoreResult<EventId> {
		let id = EventId::new();
		let properties = serde_json::to_string(&event.properties)?;
		let context = serde_json::to_string(&event.context)?;

		sqlx::query(
			r#"
			INSERT INTO events (id, tenant_id, event_name, user_id, anonymous_id, session_id,
				properties, context, timestamp, received_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(id.to_string())
		.bind(tenant_id.as_str())
		.bind(&event.event_name)
		.bind(event.user_id.as_deref())
		.bind(event.anonymous_id.as_deref())
		.bind(event.session_id.as_deref())
		.bind(properties)
		.bind(context)
		.bind(format_ts(&event.timestamp))
		.bind(format_ts(&Utc::now()))
		.execute(&self.pool)
		.await?;

		Ok(id)
	}

	#[instrument(skip(self, record), fields(tenant_id = %tenant_id))]
	async fn upsert_identity(&self, record: &IdentifyRecord, tenant_id: &TenantId) -> StoreResult<()> {
		let traits = serde_json::to_string(&record.traits)?;

		sqlx::query(
			r#"
			INSERT INTO identities (tenant_id, user_id, anonymous_id, traits, timestamp, updated_at)
			VALUES (?, ?, ?, ?, ?, ?)
			ON CONFLICT (tenant_id, user_id) DO UPDATE SET
				anonymous_id = COALESCE(excluded.anonymous_id, identities.anonymous_id),
				traits = excluded.traits,
				timestamp = excluded.timestamp,
				updated_at = excluded.updated_at
			WHERE excluded.timestamp >= identities.timestamp
			"#,
		)
		.bind(tenant_id.as_str())
		.bind(&record.user_id)
		.bind(record.anonymous_id.as_deref())
		.bind(traits)
		.bind(format_ts(&record.timestamp))
		.bind(format_ts(&Utc::now()))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(tenant_id = %tenant_id))]
	async fn count_distinct_users(
		&self,
		tenant_id: &TenantId,
		event_name: &str,
		since: DateTime<Utc>,
	) -> StoreResult<u64> {
		let count: i64 = sqlx::query_scalar(
			r#"
			SELECT COUNT(DISTINCT COALESCE(user_id, anonymous_id))
			FROM events
			WHERE tenant_id = ? AND event_name = ? AND timestamp >= ?
			"#,
		)
		.bind(tenant_id.as_str())
		.bind(event_name)
		.bind(format_ts(&since))
		.fetch_one(&self.pool)
		.await?;

		u64::try_from(count).map_err(|_| StoreError::Corrupt(format!("negative count {count}")))
	}

	#[instrument(skip(self), fields(workflow_id = %workflow_id, tenant_id = %tenant_id))]
	async fn get_workflow(
		&self,
		workflow_id: &WorkflowId,
		tenant_id: &TenantId,
	) -> StoreResult<Option<WorkflowDefinition>> {
		let name: Option<String> = sqlx::query_scalar(
			r#"
			SELECT name FROM workflows
			WHERE tenant_id = ? AND id = ?
			"#,
		)
		.bind(tenant_id.as_str())
		.bind(workflow_id.as_str())
		.fetch_optional(&self.pool)
		.await?;

		let Some(name) = name else {
			return Ok(None);
		};

		let rows = sqlx::query_as::<_, StepRow>(
			r#"
			SELECT position, event_name, label
			FROM workflow_steps
			WHERE tenant_id = ? AND workflow_id = ?
			ORDER BY position ASC
			"#,
		)
		.bind(tenant_id.as_str())
		.bind(workflow_id.as_str())
		.fetch_all(&self.pool)
		.await?;

		let steps = rows
			.into_iter()
			.map(TryInto::try_into)
			.collect::<StoreResult<Vec<_>>>()?;

		Ok(Some(WorkflowDefinition {
			id: workflow_id.clone(),
			tenant_id: tenant_id.clone(),
			name,
			steps,
		}))
	}
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
	user_id: String,
	anonymous_id: Option<String>,
	traits: String,
	timestamp: String,
}

impl TryFrom<IdentityRow> for IdentifyRecord {
	type Error = StoreError;

	fn try_from(row: IdentityRow) -> StoreResult<Self> {
		Ok(IdentifyRecord {
			traits: serde_json::from_str(&row.traits)?,
			timestamp: parse_ts(&row.timestamp, "timestamp")?,
			user_id: row.user_id,
			anonymous_id: row.anonymous_id,
		})
	}
}

#[derive(sqlx::FromRow)]
struct StepRow {
	position: i64,
	event_name: String,
	label: Option<String>,
}

impl TryFrom<StepRow> for FunnelStepDefinition {
	type Error = StoreError;

	fn try_from(row: StepRow) -> StoreResult<Self> {
		let position = u32::try_from(row.position)
			.map_err(|_| StoreError::Corrupt(format!("invalid step position {}", row.position)))?;
		Ok(FunnelStepDefinition {
			position,
			event_name: row.event_name,
			label: row.label,
		})
	}
}
