// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server side of Waypoint analytics.
//!
//! # Architecture
//!
//! - `store` - [`EventStore`] and its SQLite implementation
//! - `ingest` - batch validation and persistence
//! - `funnel` - per-step distinct-user counts and funnel arithmetic
//! - `insight` - explainer requests and the HTTP explainer
//! - `report` - funnel plus optional insight
//! - `routes` - the axum router
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use waypoint_server_analytics::*;
//!
//! let store = Arc::new(SqliteEventStore::new(create_pool("sqlite:waypoint.db").await?));
//! store.ensure_schema().await?;
//!
//! let engine = FunnelEngine::new(store.clone(), FunnelSettings::default());
//! let tenants = StaticTenantResolver::default().with_key("wp_live_xxx", "acme");
//! let state = AnalyticsState::new(store, FunnelService::new(engine), Arc::new(tenants));
//! let app = router(Arc::new(state));
//! ```

pub mod error;
pub mod funnel;
pub mod handlers;
pub mod ingest;
pub mod insight;
pub mod report;
pub mod routes;
pub mod store;
pub mod tenant;

pub use error::{FunnelError, IngestError, InsightUnavailable, StoreError, StoreResult};
pub use funnel::{compute_funnel, FunnelEngine, FunnelSettings};
pub use handlers::AnalyticsState;
pub use ingest::{ingest_batch, DEFAULT_MAX_BATCH_ITEMS};
pub use insight::{
	build_insight_request, explain_with_cancel, Explainer, HttpExplainer, DEFAULT_EXPLAIN_TIMEOUT,
	EXPLAIN_FUNNEL_PATH,
};
pub use report::{FunnelReport, FunnelService};
pub use routes::router;
pub use store::{create_pool, create_pool_with_size, EventStore, SqliteEventStore, DEFAULT_POOL_SIZE};
pub use tenant::{authenticate, ApiKeyError, StaticTenantResolver, TenantResolver, API_KEY_HEADER};

pub use waypoint_analytics_core::*;
