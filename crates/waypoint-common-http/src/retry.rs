// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Retry with exponential backoff for HTTP requests.

use reqwest::StatusCode;
use std::time::Duration;
use tracing::warn;

const RETRYABLE_STATUSES: [StatusCode; 6] = [
	StatusCode::TOO_MANY_REQUESTS,
	StatusCode::REQUEST_TIMEOUT,
	StatusCode::INTERNAL_SERVER_ERROR,
	StatusCode::BAD_GATEWAY,
	StatusCode::SERVICE_UNAVAILABLE,
	StatusCode::GATEWAY_TIMEOUT,
];

#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total attempts including the first one.
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	/// Scales each delay by a random factor in `[0.5, 1.5)`.
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(200),
			max_delay: Duration::from_secs(5),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// A config that makes exactly one attempt.
	pub fn no_retry() -> Self {
		Self {
			max_attempts: 1,
			..Self::default()
		}
	}
}

/// Throttling, timeouts and gateway errors are worth another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
	RETRYABLE_STATUSES.contains(&status)
}

pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}

		self.status().is_some_and(is_retryable_status)
	}
}

/// Delay before retry number `attempt` (zero-based), capped at `max_delay`
/// before jitter is applied.
pub fn backoff_delay(cfg: &RetryConfig, attempt: u32) -> Duration {
	let exponent = attempt.min(i32::MAX as u32) as i32;
	let exponential = cfg.base_delay.as_secs_f64() * cfg.backoff_factor.powi(exponent);
	let capped = exponential.min(cfg.max_delay.as_secs_f64());

	let delay = if cfg.jitter {
		capped * (0.5 + fastrand::f64())
	} else {
		capped
	};

	if delay.is_finite() && delay >= 0.0 {
		Duration::from_secs_f64(delay)
	} else {
		cfg.max_delay
	}
}

/// Runs `f` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is reached.
pub async fn retry<F, Fut, T, E>(cfg: &RetryConfig, mut f: F) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = Result<T, E>>,
	E: RetryableError + std::fmt::Debug,
{
	let mut attempt = 0;

	loop {
		let err = match f().await {
			Ok(result) => return Ok(result),
			Err(err) => err,
		};
		attempt += 1;

		if !err.is_retryable() {
			warn!(error = ?err, attempt, "non-retryable error encountered");
			return Err(err);
		}

		if attempt >= cfg.max_attempts {
			warn!(
				error = ?err,
				attempt,
				max_attempts = cfg.max_attempts,
				"max retry attempts exhausted"
			);
			return Err(err);
		}

		let delay = backoff_delay(cfg, attempt - 1);
		warn!(
			error = ?err,
			attempt,
			max_attempts = cfg.max_attempts,
			delay_ms = delay.as_millis() as u64,
			"retrying after error"
		);

		tokio::time::sleep(delay).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	#[derive(Debug)]
	struct FlakyError {
		retryable: bool,
	}

	impl RetryableError for FlakyError {
		fn is_retryable(&self) -> bool {
			self.retryable
		}
	}

	fn fast_config(max_attempts: u32) -> RetryConfig {
		RetryConfig {
			max_attempts,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(10),
			backoff_factor: 2.0,
			jitter: false,
		}
	}

	/// Purpose: A 4xx-style failure must surface on the first attempt so
	/// callers see bad requests immediately instead of after the full backoff.
	#[tokio::test]
	async fn non_retryable_error_is_returned_after_one_attempt() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);

		let result: Result<(), FlakyError> = retry(&RetryConfig::default(), || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(FlakyError { retryable: false })
			}
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	/// Purpose: Transient failures are retried, but never past `max_attempts`.
	#[tokio::test]
	async fn retryable_error_stops_at_max_attempts() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);

		let result: Result<(), FlakyError> = retry(&fast_config(4), || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(FlakyError { retryable: true })
			}
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 4);
	}

	/// Purpose: Recovery after a couple of transient failures yields the value
	/// from the first successful attempt.
	#[tokio::test]
	async fn recovers_after_transient_failures() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);

		let result: Result<u32, FlakyError> = retry(&fast_config(5), || {
			let counter = Arc::clone(&counter);
			async move {
				let n = counter.fetch_add(1, Ordering::SeqCst);
				if n < 2 {
					Err(FlakyError { retryable: true })
				} else {
					Ok(n)
				}
			}
		})
		.await;

		assert_eq!(result.unwrap(), 2);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn no_retry_makes_a_single_attempt() {
		let calls = AtomicU32::new(0);
		let result: Result<(), FlakyError> = tokio_test::block_on(retry(&RetryConfig::no_retry(), || {
			calls.fetch_add(1, Ordering::SeqCst);
			async { Err(FlakyError { retryable: true }) }
		}));

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn default_statuses_cover_throttling_and_gateway_errors() {
		assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
		assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
		assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
		assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
		assert!(!is_retryable_status(StatusCode::PAYLOAD_TOO_LARGE));
	}

	/// Purpose: Without jitter the delay doubles per attempt until it hits
	/// the cap.
	#[test]
	fn backoff_grows_exponentially_then_caps() {
		let cfg = RetryConfig {
			base_delay: Duration::from_millis(100),
			max_delay: Duration::from_millis(500),
			jitter: false,
			..RetryConfig::default()
		};

		assert_eq!(backoff_delay(&cfg, 0), Duration::from_millis(100));
		assert_eq!(backoff_delay(&cfg, 1), Duration::from_millis(200));
		assert_eq!(backoff_delay(&cfg, 2), Duration::from_millis(400));
		assert_eq!(backoff_delay(&cfg, 3), Duration::from_millis(500));
		assert_eq!(backoff_delay(&cfg, 1_000), Duration::from_millis(500));
	}

	/// Purpose: Jittered delays stay inside `[0.5, 1.5)` of the capped delay,
	/// so clients that failed together spread out without waiting unboundedly.
	#[test]
	fn jitter_stays_within_bounds() {
		let cfg = RetryConfig {
			base_delay: Duration::from_millis(100),
			max_delay: Duration::from_secs(5),
			jitter: true,
			..RetryConfig::default()
		};

		for _ in 0..100 {
			let delay = backoff_delay(&cfg, 1);
			assert!(delay >= Duration::from_millis(100), "{delay:?} below lower bound");
			assert!(delay < Duration::from_millis(300), "{delay:?} above upper bound");
		}
	}
}
