// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key to tenant resolution.

use std::collections::HashMap;

use axum::{
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	Json,
};
use waypoint_analytics_core::{ErrorResponse, TenantId};

/// Header carrying the tenant API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Maps an API key to the tenant that owns it.
pub trait TenantResolver: Send + Sync {
	fn resolve(&self, api_key: &str) -> Option<TenantId>;
}

/// Resolver backed by a fixed key table, usually loaded from config.
#[derive(Debug, Clone, Default)]
pub struct StaticTenantResolver {
	keys: HashMap<String, TenantId>,
}

impl StaticTenantResolver {
	pub fn new(keys: HashMap<String, TenantId>) -> Self {
		Self { keys }
	}

	pub fn with_key(mut self, api_key: impl Into<String>, tenant_id: impl Into<String>) -> Self {
		self.keys.insert(api_key.into(), TenantId::new(tenant_id));
		self
	}

	pub fn len(&self) -> usize {
		self.keys.len()
	}

	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}
}

impl TenantResolver for StaticTenantResolver {
	fn resolve(&self, api_key: &str) -> Option<TenantId> {
		self.keys.get(api_key).cloned()
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeyError {
	Missing,
	Invalid,
}

impl IntoResponse for ApiKeyError {
	fn into_response(self) -> Response {
		let (error, message) = match self {
			Self::Missing => ("missing_api_key", "x-api-key header is required"),
			Self::Invalid => ("invalid_api_key", "Invalid API key"),
		};

		(
			StatusCode::UNAUTHORIZED,
			Json(ErrorResponse {
				error: error.to_string(),
				message: message.to_string(),
			}),
		)
			.into_response()
	}
}

/// Resolves the tenant for a request from its `x-api-key` header.
pub fn authenticate(
	headers: &HeaderMap,
	resolver: &dyn TenantResolver,
) -> Result<TenantId, ApiKeyError> {
	let key = headers
		.get(API_KEY_HEADER)
		.and_then(|v| v.to_str().ok())
		.map(str::trim)
		.filter(|k| !k.is_empty())
		.ok_or(ApiKeyError::Missing)?;

	resolver.resolve(key).ok_or(ApiKeyError::Invalid)
}
