// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Workflow definitions, funnel results and time windows.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::event::TenantId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(String);

impl WorkflowId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for WorkflowId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for WorkflowId {
	fn from(s: &str) -> Self {
		Self(s.to_string())
	}
}

/// One step of a funnel, matched by exact event name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStepDefinition {
	pub position: u32,
	pub event_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
}

impl FunnelStepDefinition {
	pub fn new(position: u32, event_name: impl Into<String>) -> Self {
		Self {
			position,
			event_name: event_name.into(),
			label: None,
		}
	}

	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	/// Label when set, else the event name.
	pub fn display_name(&self) -> &str {
		self.label.as_deref().unwrap_or(&self.event_name)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
	pub id: WorkflowId,
	pub tenant_id: TenantId,
	pub name: String,
	pub steps: Vec<FunnelStepDefinition>,
}

impl WorkflowDefinition {
	/// Steps sorted by `position`, which defines the funnel sequence.
	pub fn ordered_steps(&self) -> Vec<FunnelStepDefinition> {
		let mut steps = self.steps.clone();
		steps.sort_by_key(|step| step.position);
		steps
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStepResult {
	pub position: u32,
	pub event_name: String,
	pub name: String,
	pub user_count: u64,
	pub drop_off_pct: f64,
	pub conversion_from_previous_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelResult {
	pub workflow_id: WorkflowId,
	pub time_window: TimeWindow,
	pub steps: Vec<FunnelStepResult>,
	pub overall_conversion_pct: f64,
	/// Users who entered the funnel, i.e. the first step's count.
	pub total_users: u64,
}

/// A relative look-back window such as `7d` or `24h`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeWindow {
	token: String,
	span: TimeDelta,
}

impl TimeWindow {
	/// Parses `<N>d` or `<N>h` where `N` is a positive integer.
	pub fn parse(input: &str) -> Result<Self> {
		let token = input.trim();
		let invalid = || CoreError::InvalidTimeWindow(input.to_string());

		if token.len() < 2 || !token.is_ascii() {
			return Err(invalid());
		}
		let (digits, unit) = token.split_at(token.len() - 1);
		if !digits.bytes().all(|b| b.is_ascii_digit()) {
			return Err(invalid());
		}
		let amount: i64 = digits.parse().map_err(|_| invalid())?;
		if amount == 0 {
			return Err(invalid());
		}

		let span = match unit {
			"d" => TimeDelta::try_days(amount),
			"h" => TimeDelta::try_hours(amount),
			_ => None,
		}
		.ok_or_else(invalid)?;

		Ok(Self {
			token: token.to_string(),
			span,
		})
	}

	pub fn as_str(&self) -> &str {
		&self.token
	}

	pub fn span(&self) -> TimeDelta {
		self.span
	}

	/// Start of the window ending at `now`.
	pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
		now.checked_sub_signed(self.span)
			.unwrap_or(DateTime::<Utc>::MIN_UTC)
	}
}

impl std::str::FromStr for TimeWindow {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self> {
		Self::parse(s)
	}
}

impl TryFrom<String> for TimeWindow {
	type Error = CoreError;

	fn try_from(s: String) -> Result<Self> {
		Self::parse(&s)
	}
}

impl From<TimeWindow> for String {
	fn from(window: TimeWindow) -> Self {
		window.token
	}
}

impl std::fmt::Display for TimeWindow {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.token)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use proptest::prelude::*;

	#[test]
	fn parses_days_and_hours() {
		assert_eq!(TimeWindow::parse("7d").unwrap().span(), TimeDelta::days(7));
		assert_eq!(TimeWindow::parse("24h").unwrap().span(), TimeDelta::hours(24));
		assert_eq!(TimeWindow::parse(" 30d ").unwrap().as_str(), "30d");
	}

	#[test]
	fn rejects_unknown_tokens() {
		for token in ["", "d", "7", "0d", "-1d", "7w", "1.5d", "7D", "seven days", "+7d"] {
			assert!(
				matches!(TimeWindow::parse(token), Err(CoreError::InvalidTimeWindow(_))),
				"{token:?} should be rejected"
			);
		}
	}

	#[test]
	fn since_subtracts_span() {
		let now = Utc.with_ymd_and_hms(2025, 3, 8, 0, 0, 0).unwrap();
		let window = TimeWindow::parse("7d").unwrap();
		assert_eq!(window.since(now), Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
	}

	#[test]
	fn serializes_as_token() {
		let window = TimeWindow::parse("24h").unwrap();
		assert_eq!(serde_json::to_value(&window).unwrap(), serde_json::json!("24h"));
		let back: TimeWindow = serde_json::from_value(serde_json::json!("24h")).unwrap();
		assert_eq!(back, window);
	}

	#[test]
	fn ordered_steps_sort_by_position() {
		let workflow = WorkflowDefinition {
			id: WorkflowId::new("wf-1"),
			tenant_id: TenantId::new("acme"),
			name: "Onboarding".to_string(),
			steps: vec![
				FunnelStepDefinition::new(3, "activated"),
				FunnelStepDefinition::new(1, "signup").with_label("Sign up"),
				FunnelStepDefinition::new(2, "verified"),
			],
		};

		let names: Vec<_> = workflow.ordered_steps().into_iter().map(|s| s.event_name).collect();
		assert_eq!(names, ["signup", "verified", "activated"]);
		assert_eq!(workflow.ordered_steps()[0].display_name(), "Sign up");
		assert_eq!(workflow.ordered_steps()[1].display_name(), "verified");
	}

	proptest! {
		#[test]
		fn any_positive_day_count_parses(n in 1u32..100_000) {
			let window = TimeWindow::parse(&format!("{n}d")).unwrap();
			prop_assert_eq!(window.span(), TimeDelta::days(n as i64));
		}

		#[test]
		fn since_never_panics(n in 1u64..u64::MAX) {
			if let Ok(window) = TimeWindow::parse(&format!("{n}h")) {
				let _ = window.since(Utc::now());
			}
		}
	}
}
