// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The client-side event queue.
//!
//! Events are buffered in memory and flushed when the buffer reaches
//! `batch_size` or when `flush_interval` has elapsed since the first buffered
//! item, whichever comes first. A failed batch is put back at the front of
//! the buffer, ahead of anything queued while it was in flight, and retried on
//! the next trigger after an exponential backoff.
//!
//! A flush sends the buffer in chunks of at most `max_batch_items` items and
//! `max_batch_bytes` encoded bytes, the limits the ingestion endpoint enforces,
//! so a backlog built up during an outage drains once the server is back.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use waypoint_analytics_core::{
	validate_event_name, validate_identifier, validate_properties_size, BatchEntry, IdentifyRecord,
	TrackedEvent, BATCH_ENVELOPE_BYTES, CONTEXT_LIBRARY, CONTEXT_LIBRARY_VERSION,
	DEFAULT_MAX_BATCH_ITEMS, MAX_BATCH_BODY_BYTES,
};
use waypoint_common_http::{backoff_delay, RetryConfig};

use crate::error::{AnalyticsError, Result};
use crate::properties::Properties;
use crate::transport::BatchTransport;

const SDK_NAME: &str = "waypoint-analytics";
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct QueueConfig {
	/// Buffer length that triggers a flush.
	pub batch_size: usize,
	/// Maximum time an item waits in the buffer before a flush.
	pub flush_interval: Duration,
	/// Hard cap on buffered items; the oldest are dropped beyond it.
	pub max_buffer_size: usize,
	/// Most items sent in one request.
	pub max_batch_items: usize,
	/// Most encoded bytes sent in one request. An item larger than this on
	/// its own is still sent alone.
	pub max_batch_bytes: usize,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			batch_size: 10,
			flush_interval: Duration::from_millis(5000),
			max_buffer_size: 1000,
			max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
			max_batch_bytes: MAX_BATCH_BODY_BYTES,
		}
	}
}

/// Lifecycle of a single drained batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
	Pending,
	Sending,
	Delivered,
	Requeued,
}

/// Result of one flush attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
	/// Nothing was buffered.
	Empty,
	/// Every chunk was accepted; `queued_id` is the last one's.
	Delivered { count: usize, queued_id: String },
	/// A chunk failed; it and the unsent rest are back at the front of the
	/// buffer. `count` covers both. Chunks accepted before it stay delivered.
	Requeued { count: usize, error: String },
}

impl FlushOutcome {
	pub fn state(&self) -> Option<BatchState> {
		match self {
			FlushOutcome::Empty => None,
			FlushOutcome::Delivered { .. } => Some(BatchState::Delivered),
			FlushOutcome::Requeued { .. } => Some(BatchState::Requeued),
		}
	}
}

/// Where and how batches are delivered.
#[derive(Debug, Clone)]
pub struct QueueTarget {
	pub endpoint: String,
	pub api_key: String,
}

struct QueueState {
	buffer: VecDeque<BatchEntry>,
	/// Start of the flush timer; `None` while disarmed.
	first_buffered_at: Option<Instant>,
	user_id: Option<String>,
	/// Set by `identify()` to flush without waiting for a threshold.
	flush_requested: bool,
	consecutive_failures: u32,
	backoff_until: Option<Instant>,
}

pub struct EventQueue {
	config: QueueConfig,
	backoff: RetryConfig,
	target: QueueTarget,
	transport: Arc<dyn BatchTransport>,
	session_id: String,
	anonymous_id: String,
	state: Mutex<QueueState>,
	/// Held for the whole drain/send/requeue cycle so batches never reorder.
	flush_lock: Mutex<()>,
	wake: Notify,
	shutdown: AtomicBool,
	dropped: AtomicU64,
}

impl EventQueue {
	pub fn new(
		config: QueueConfig,
		backoff: RetryConfig,
		target: QueueTarget,
		transport: Arc<dyn BatchTransport>,
	) -> Self {
		Self {
			config,
			backoff,
			target,
			transport,
			session_id: new_session_id(),
			anonymous_id: format!("anon-{}", Uuid::new_v4()),
			state: Mutex::new(QueueState {
				buffer: VecDeque::new(),
				first_buffered_at: None,
				user_id: None,
				flush_requested: false,
				consecutive_failures: 0,
				backoff_until: None,
			}),
			flush_lock: Mutex::new(()),
			wake: Notify::new(),
			shutdown: AtomicBool::new(false),
			dropped: AtomicU64::new(0),
		}
	}

	pub fn session_id(&self) -> &str {
		&self.session_id
	}

	pub fn anonymous_id(&self) -> &str {
		&self.anonymous_id
	}

	pub async fn user_id(&self) -> Option<String> {
		self.state.lock().await.user_id.clone()
	}

	pub async fn len(&self) -> usize {
		self.state.lock().await.buffer.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.state.lock().await.buffer.is_empty()
	}

	/// Items discarded because the buffer hit `max_buffer_size`.
	pub fn dropped_count(&self) -> u64 {
		self.dropped.load(Ordering::SeqCst)
	}

	pub fn is_shutdown(&self) -> bool {
		self.shutdown.load(Ordering::SeqCst)
	}

	/// Queues an event stamped with the current session and user identity.
	///
	/// Fails only on an invalid name or properties, or after shutdown.
	pub async fn track(&self, event_name: &str, properties: Properties) -> Result<()> {
		self.check_open()?;
		validate_event_name(event_name)?;
		let properties = properties.into_value();
		validate_properties_size(&properties)?;

		let mut state = self.state.lock().await;
		let event = TrackedEvent::new(event_name, self.anonymous_id.as_str())
			.with_user_id(state.user_id.clone())
			.with_session_id(self.session_id.as_str())
			.with_properties(properties)
			.with_timestamp(Utc::now())
			.with_context(CONTEXT_LIBRARY, SDK_NAME)
			.with_context(CONTEXT_LIBRARY_VERSION, SDK_VERSION);

		let wake = self.push(&mut state, BatchEntry::Track(event));
		drop(state);

		if wake {
			self.wake.notify_one();
		}
		Ok(())
	}

	/// Sets the user for subsequent events and queues an identify record.
	///
	/// The record joins the buffer and the flush loop is woken to send the
	/// whole buffer without waiting for a threshold.
	pub async fn identify(&self, user_id: &str, traits: Properties) -> Result<()> {
		self.check_open()?;
		validate_identifier(user_id)?;
		let traits = traits.into_value();
		validate_properties_size(&traits)?;

		let mut state = self.state.lock().await;
		state.user_id = Some(user_id.to_string());
		let record = IdentifyRecord::new(user_id)
			.with_anonymous_id(self.anonymous_id.as_str())
			.with_traits(traits)
			.with_timestamp(Utc::now());
		self.push(&mut state, BatchEntry::Identify(record));
		state.flush_requested = true;
		drop(state);

		debug!(user_id, "identify queued, requesting flush");
		self.wake.notify_one();
		Ok(())
	}

	/// Sends everything buffered when called, one chunk at a time.
	///
	/// Ignores any backoff in effect. Stops at the first failed chunk.
	/// Transport failures are not errors here: the failed chunk is requeued
	/// and reported as [`FlushOutcome::Requeued`].
	pub async fn flush(&self) -> FlushOutcome {
		let _flushing = self.flush_lock.lock().await;

		let mut remaining = {
			let mut state = self.state.lock().await;
			state.first_buffered_at = None;
			state.flush_requested = false;
			state.buffer.len()
		};

		let mut delivered = 0;
		let mut queued_id = String::new();
		while remaining > 0 {
			let batch = {
				let mut state = self.state.lock().await;
				self.take_chunk(&mut state, remaining)
			};
			if batch.is_empty() {
				break;
			}

			let count = batch.len();
			remaining = remaining.saturating_sub(count);
			let mut batch_state = BatchState::Pending;
			self.advance(&mut batch_state, BatchState::Sending, count);

			match self
				.transport
				.send(&self.target.endpoint, &batch, &self.target.api_key)
				.await
			{
				Ok(response) => {
					self.advance(&mut batch_state, BatchState::Delivered, count);
					let mut state = self.state.lock().await;
					state.consecutive_failures = 0;
					state.backoff_until = None;
					delivered += count;
					queued_id = response.queued_id;
				}
				Err(err) => {
					self.advance(&mut batch_state, BatchState::Requeued, count);
					let delay = self.requeue(batch).await;
					error!(
						error = %err,
						count,
						unsent = remaining,
						delivered,
						retry_in_ms = delay.as_millis() as u64,
						"failed to deliver analytics batch, requeued"
					);
					return FlushOutcome::Requeued {
						count: count + remaining,
						error: err.to_string(),
					};
				}
			}
		}

		{
			// Items queued behind unsent chunks never armed the timer.
			let mut state = self.state.lock().await;
			if !state.buffer.is_empty() && state.first_buffered_at.is_none() {
				state.first_buffered_at = Some(Instant::now());
			}
		}

		if delivered == 0 {
			FlushOutcome::Empty
		} else {
			FlushOutcome::Delivered { count: delivered, queued_id }
		}
	}

	/// Stops accepting new items and wakes the flush loop for its final flush.
	pub fn shutdown(&self) {
		self.shutdown.store(true, Ordering::SeqCst);
		self.wake.notify_one();
	}

	/// Runs the background flush loop until [`EventQueue::shutdown`] is called,
	/// then flushes once more.
	pub async fn run(&self) {
		info!(
			batch_size = self.config.batch_size,
			max_batch_items = self.config.max_batch_items,
			flush_interval_ms = self.config.flush_interval.as_millis() as u64,
			session_id = %self.session_id,
			"starting analytics event queue"
		);

		while !self.is_shutdown() {
			match self.next_deadline().await {
				Some(deadline) if deadline <= Instant::now() => {
					self.flush().await;
				}
				Some(deadline) => {
					tokio::select! {
						_ = tokio::time::sleep_until(deadline) => {}
						_ = self.wake.notified() => {}
					}
				}
				None => self.wake.notified().await,
			}
		}

		if let FlushOutcome::Requeued { count, .. } = self.flush().await {
			warn!(count, "analytics events still buffered at shutdown");
		}
		info!("analytics event queue stopped");
	}

	fn check_open(&self) -> Result<()> {
		if self.is_shutdown() {
			return Err(AnalyticsError::ClientShutdown);
		}
		Ok(())
	}

	/// Appends an entry, arming the timer if the buffer was empty. Returns
	/// whether the flush loop needs to recompute its deadline.
	fn push(&self, state: &mut QueueState, entry: BatchEntry) -> bool {
		let was_empty = state.buffer.is_empty();
		if was_empty {
			state.first_buffered_at = Some(Instant::now());
		}
		state.buffer.push_back(entry);
		self.enforce_capacity(state);
		was_empty || state.buffer.len() >= self.config.batch_size
	}

	fn enforce_capacity(&self, state: &mut QueueState) {
		while state.buffer.len() > self.config.max_buffer_size {
			let Some(dropped) = state.buffer.pop_front() else {
				break;
			};
			let total = self.dropped.fetch_add(1, Ordering::SeqCst) + 1;
			warn!(
				kind = dropped.kind(),
				dropped_total = total,
				max_buffer_size = self.config.max_buffer_size,
				"dropped oldest analytics item, buffer full"
			);
		}
	}

	/// Pops the next chunk off the front of the buffer, at most `limit`
	/// items and within the per-request item and byte caps. Always takes at
	/// least one item when the buffer is non-empty.
	fn take_chunk(&self, state: &mut QueueState, limit: usize) -> Vec<BatchEntry> {
		let max_items = self.config.max_batch_items.min(limit);
		let mut chunk = Vec::new();
		let mut bytes = BATCH_ENVELOPE_BYTES;

		while chunk.len() < max_items {
			let Some(next) = state.buffer.front() else {
				break;
			};
			let size = next.encoded_len() + usize::from(!chunk.is_empty());
			if !chunk.is_empty() && bytes + size > self.config.max_batch_bytes {
				break;
			}
			bytes += size;
			if let Some(entry) = state.buffer.pop_front() {
				chunk.push(entry);
			}
		}
		chunk
	}

	/// Puts a failed batch back in front of anything queued meanwhile and
	/// schedules the next automatic attempt. Returns the backoff delay.
	async fn requeue(&self, batch: Vec<BatchEntry>) -> Duration {
		let mut state = self.state.lock().await;

		let mut restored: VecDeque<BatchEntry> = batch.into();
		restored.extend(state.buffer.drain(..));
		state.buffer = restored;

		let now = Instant::now();
		state.first_buffered_at = Some(now);
		let delay = backoff_delay(&self.backoff, state.consecutive_failures);
		state.consecutive_failures = state.consecutive_failures.saturating_add(1);
		state.backoff_until = Some(now + delay);

		self.enforce_capacity(&mut state);
		delay
	}

	/// When the loop should next flush, or `None` while the buffer is empty.
	async fn next_deadline(&self) -> Option<Instant> {
		let state = self.state.lock().await;
		if state.buffer.is_empty() {
			return None;
		}

		let now = Instant::now();
		let due = if state.flush_requested || state.buffer.len() >= self.config.batch_size {
			now
		} else {
			state
				.first_buffered_at
				.map(|armed| armed + self.config.flush_interval)
				.unwrap_or(now)
		};

		Some(match state.backoff_until {
			Some(until) if until > due => until,
			_ => due,
		})
	}

	fn advance(&self, current: &mut BatchState, next: BatchState, count: usize) {
		debug!(from = ?current, to = ?next, count, "analytics batch transition");
		*current = next;
	}
}

/// Opaque per-process session identifier: `session-<uuidv7>`, which sorts
/// roughly by creation time.
fn new_session_id() -> String {
	let id = uuid7::uuid7();
	format!("session-{}", Uuid::from_bytes(*id.as_bytes()))
}
