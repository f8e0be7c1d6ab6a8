// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Analytics client: owns the event queue and its background flush task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};
use waypoint_common_http::RetryConfig;

use crate::error::{AnalyticsError, Result};
use crate::properties::Properties;
use crate::queue::{EventQueue, FlushOutcome, QueueConfig, QueueTarget};
use crate::transport::{BatchTransport, HttpBatchTransport, EVENTS_PATH};

#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Timeout for a single HTTP request.
	pub request_timeout: Duration,
	pub queue: QueueConfig,
	/// Drives both in-request retries and the backoff between failed flushes.
	pub retry_config: RetryConfig,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			request_timeout: Duration::from_secs(10),
			queue: QueueConfig::default(),
			retry_config: RetryConfig::default(),
		}
	}
}

pub struct AnalyticsClientBuilder {
	api_key: Option<String>,
	base_url: Option<String>,
	config: ClientConfig,
	transport: Option<Arc<dyn BatchTransport>>,
}

impl AnalyticsClientBuilder {
	pub fn new() -> Self {
		Self {
			api_key: None,
			base_url: None,
			config: ClientConfig::default(),
			transport: None,
		}
	}

	/// Tenant API key sent in the `x-api-key` header.
	pub fn api_key(mut self, key: impl Into<String>) -> Self {
		self.api_key = Some(key.into());
		self
	}

	/// Server base URL, e.g. `https://waypoint.example.com`.
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	pub fn flush_interval(mut self, interval: Duration) -> Self {
		self.config.queue.flush_interval = interval;
		self
	}

	pub fn batch_size(mut self, size: usize) -> Self {
		self.config.queue.batch_size = size.max(1);
		self
	}

	pub fn max_buffer_size(mut self, size: usize) -> Self {
		self.config.queue.max_buffer_size = size.max(1);
		self
	}

	/// Caps items per request. Match the server's `ingest.max_batch_items`.
	pub fn max_batch_items(mut self, items: usize) -> Self {
		self.config.queue.max_batch_items = items.max(1);
		self
	}

	/// Caps the encoded size of one request body.
	pub fn max_batch_bytes(mut self, bytes: usize) -> Self {
		self.config.queue.max_batch_bytes = bytes;
		self
	}

	pub fn retry_config(mut self, config: RetryConfig) -> Self {
		self.config.retry_config = config;
		self
	}

	/// Replaces the HTTP transport, e.g. with an in-process one.
	pub fn transport(mut self, transport: Arc<dyn BatchTransport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Builds the client and spawns its flush loop. Must be called inside a
	/// tokio runtime.
	pub fn build(self) -> Result<AnalyticsClient> {
		let api_key = self
			.api_key
			.filter(|key| !key.trim().is_empty())
			.ok_or(AnalyticsError::InvalidApiKey)?;
		let base_url = self
			.base_url
			.ok_or_else(|| AnalyticsError::InvalidBaseUrl("missing".to_string()))?;

		if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
			return Err(AnalyticsError::InvalidBaseUrl(base_url));
		}
		let base_url = base_url.trim_end_matches('/').to_string();

		let transport = match self.transport {
			Some(transport) => transport,
			None => {
				let http_client = waypoint_common_http::builder()
					.timeout(self.config.request_timeout)
					.build()?;
				Arc::new(HttpBatchTransport::new(
					http_client,
					self.config.retry_config.clone(),
				))
			}
		};

		let target = QueueTarget {
			endpoint: format!("{base_url}{EVENTS_PATH}"),
			api_key,
		};
		let queue = Arc::new(EventQueue::new(
			self.config.queue.clone(),
			self.config.retry_config.clone(),
			target,
			transport,
		));

		let runner = Arc::clone(&queue);
		let flush_handle = tokio::spawn(async move {
			runner.run().await;
		});

		info!(
			base_url = %base_url,
			session_id = %queue.session_id(),
			"analytics client initialized"
		);

		Ok(AnalyticsClient {
			base_url,
			queue,
			flush_handle: Mutex::new(Some(flush_handle)),
		})
	}
}

impl Default for AnalyticsClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Tracks events and identifies users for one session.
///
/// # Example
///
/// ```ignore
/// use waypoint_analytics::{AnalyticsClient, Properties};
///
/// let client = AnalyticsClient::builder()
///     .api_key("wp_live_xxx")
///     .base_url("https://waypoint.example.com")
///     .build()?;
///
/// client.track("Checkout Started", Properties::new().insert("items", 3)).await?;
/// client.identify("user_123", Properties::new().insert("plan", "pro")).await?;
/// client.shutdown().await?;
/// ```
pub struct AnalyticsClient {
	base_url: String,
	queue: Arc<EventQueue>,
	flush_handle: Mutex<Option<JoinHandle<()>>>,
}

impl AnalyticsClient {
	pub fn builder() -> AnalyticsClientBuilder {
		AnalyticsClientBuilder::new()
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	pub fn session_id(&self) -> &str {
		self.queue.session_id()
	}

	pub fn anonymous_id(&self) -> &str {
		self.queue.anonymous_id()
	}

	pub async fn user_id(&self) -> Option<String> {
		self.queue.user_id().await
	}

	pub async fn queue_len(&self) -> usize {
		self.queue.len().await
	}

	/// Events lost to buffer overflow since the client was built.
	pub fn dropped_events(&self) -> u64 {
		self.queue.dropped_count()
	}

	pub async fn track(&self, event_name: &str, properties: Properties) -> Result<()> {
		self.queue.track(event_name, properties).await
	}

	pub async fn identify(&self, user_id: &str, traits: Properties) -> Result<()> {
		self.queue.identify(user_id, traits).await
	}

	/// Sends everything buffered now, regardless of thresholds or backoff.
	pub async fn flush(&self) -> FlushOutcome {
		self.queue.flush().await
	}

	/// Stops the flush loop after a final flush. Later calls are no-ops.
	pub async fn shutdown(&self) -> Result<()> {
		self.queue.shutdown();

		let handle = self.flush_handle.lock().await.take();
		if let Some(handle) = handle {
			if let Err(e) = handle.await {
				error!(error = %e, "analytics flush task ended abnormally");
			}
			info!(
				dropped = self.queue.dropped_count(),
				"analytics client shut down"
			);
		}
		Ok(())
	}
}
