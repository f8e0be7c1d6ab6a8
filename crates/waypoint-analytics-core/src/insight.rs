// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request and response types exchanged with the AI explainer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::funnel::WorkflowId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightStep {
	pub name: String,
	pub event: String,
	pub position: u32,
}

/// Funnel shape sent to the explainer. `counts[i]` belongs to `steps[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightRequest {
	pub workflow_id: WorkflowId,
	pub steps: Vec<InsightStep>,
	pub counts: Vec<u64>,
	pub time_window: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub segment: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightResponse {
	pub summary: String,
	#[serde(default)]
	pub key_drivers: Vec<String>,
	#[serde(default)]
	pub suggestions: Vec<String>,
}
