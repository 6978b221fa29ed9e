//! Alertmanager payload types.
//!
//! [`WebhookMessage`] is the body Alertmanager POSTs to a webhook receiver
//! (format version 4). [`Notification`] is what the renderer consumes: the
//! batch-level fields of a webhook plus the alerts routed to one chat.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::universe::{ENVIRONMENT_LABEL, PROJECT_LABEL};

pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
  #[default]
  Firing,
  Resolved,
}

/// A single alert as carried in a webhook payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
  #[serde(default)]
  pub status:        AlertStatus,
  #[serde(default)]
  pub labels:        Labels,
  #[serde(default)]
  pub annotations:   Labels,
  pub starts_at:     Option<DateTime<Utc>>,
  pub ends_at:       Option<DateTime<Utc>>,
  #[serde(default, rename = "generatorURL")]
  pub generator_url: String,
  #[serde(default)]
  pub fingerprint:   String,
}

impl Alert {
  pub fn label(&self, name: &str) -> Option<&str> {
    self.labels.get(name).map(String::as_str)
  }

  pub fn environment(&self) -> Option<&str> { self.label(ENVIRONMENT_LABEL) }

  pub fn project(&self) -> Option<&str> { self.label(PROJECT_LABEL) }

  pub fn name(&self) -> &str { self.label("alertname").unwrap_or("unnamed alert") }
}

/// Body of an Alertmanager webhook notification.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessage {
  #[serde(default)]
  pub version:            String,
  #[serde(default)]
  pub group_key:          String,
  #[serde(default)]
  pub truncated_alerts:   u64,
  #[serde(default)]
  pub status:             AlertStatus,
  #[serde(default)]
  pub receiver:           String,
  #[serde(default)]
  pub group_labels:       Labels,
  #[serde(default)]
  pub common_labels:      Labels,
  #[serde(default)]
  pub common_annotations: Labels,
  #[serde(default, rename = "externalURL")]
  pub external_url:       String,
  #[serde(default)]
  pub alerts:             Vec<Alert>,
}

/// Render input: one webhook batch narrowed to the alerts for one chat.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Notification {
  pub receiver:           String,
  pub status:             AlertStatus,
  pub group_labels:       Labels,
  pub common_labels:      Labels,
  pub common_annotations: Labels,
  pub external_url:       String,
  pub alerts:             Vec<Alert>,
}

impl Notification {
  /// Batch-level fields of `webhook` with an empty alert list.
  pub fn for_batch(webhook: &WebhookMessage) -> Self {
    Self {
      receiver:           webhook.receiver.clone(),
      status:             webhook.status,
      group_labels:       webhook.group_labels.clone(),
      common_labels:      webhook.common_labels.clone(),
      common_annotations: webhook.common_annotations.clone(),
      external_url:       webhook.external_url.clone(),
      alerts:             Vec::new(),
    }
  }
}

// ─── Alertmanager API types ──────────────────────────────────────────────────

/// A silence matcher, as returned by `/api/v2/silences`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matcher {
  pub name:     String,
  pub value:    String,
  #[serde(default)]
  pub is_regex: bool,
  #[serde(default = "default_true")]
  pub is_equal: bool,
}

fn default_true() -> bool { true }

impl Matcher {
  /// `name="value"`, `name=~"value"`, `name!="value"` or `name!~"value"`.
  pub fn expression(&self) -> String {
    let op = match (self.is_equal, self.is_regex) {
      (true, false) => "=",
      (true, true) => "=~",
      (false, false) => "!=",
      (false, true) => "!~",
    };
    format!("{}{op}\"{}\"", self.name, self.value)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceState {
  pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Silence {
  pub id:         String,
  pub status:     SilenceState,
  pub matchers:   Vec<Matcher>,
  pub starts_at:  DateTime<Utc>,
  pub ends_at:    DateTime<Utc>,
  #[serde(default)]
  pub created_by: String,
  #[serde(default)]
  pub comment:    String,
}

/// Version and uptime reported by Alertmanager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
  pub version: String,
  pub uptime:  DateTime<Utc>,
}
