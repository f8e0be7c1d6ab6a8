// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::{response::IntoResponse, Json};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
	Json(json!({ "status": "ok" }))
}

pub async fn ready() -> impl IntoResponse {
	Json(json!({ "ready": true }))
}
