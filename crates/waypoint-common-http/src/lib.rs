// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Waypoint.
//!
//! This crate provides:
//! - A reqwest client builder with a consistent User-Agent header
//! - Retry with exponential backoff and jitter for transient failures
//! - The backoff delay calculation on its own, for callers that schedule
//!   their own retries

mod client;
mod retry;

pub use client::{builder, builder_with_user_agent, new_client_with_timeout, user_agent};
pub use retry::{backoff_delay, is_retryable_status, retry, RetryConfig, RetryableError};
