//! HTML rendering of notifications, alert lists, silences and the status
//! reply, through a `handlebars` registry.
//!
//! The notification template is registered as [`DEFAULT_TEMPLATE`] and can be
//! replaced by a user template file; the other replies use built-in templates.
//! Interpolated values go through handlebars' HTML escaping.
//!
//! In the built-in templates alerts are separated by a blank line and never
//! contain one themselves (annotations are collapsed to one paragraph), so
//! truncation at the last `"\n\n"` always lands between two alerts.

use std::path::Path;

use alertgram_core::alert::{Alert, AlertStatus, Labels, Notification, Silence};
use chrono::{DateTime, TimeDelta, Utc};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;

use crate::{Error, Result};

/// Name of the notification template, the one a template file overrides.
pub const DEFAULT_TEMPLATE: &str = "telegram.default";

/// Partial rendering one alert; usable from a custom template as
/// `{{> alert}}`.
pub const ALERT_PARTIAL: &str = "alert";

const ALERT_LIST: &str = "telegram.alerts";
const SILENCE_LIST: &str = "telegram.silences";
const STATUS: &str = "telegram.status";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

// Block helpers never stand alone on a line, so handlebars keeps every
// newline written here.
const NOTIFICATION_TEMPLATE: &str = concat!(
  "{{#if firing_batch}}🔥 <b>[FIRING:{{firing}}]</b>",
  "{{else}}✅ <b>[RESOLVED:{{total}}]</b>{{/if}}",
  "{{#each group_labels}} {{@key}}={{this}}{{/each}}",
  "{{#if receiver}}\n<i>receiver: {{receiver}}</i>{{/if}}",
  "{{#each alerts}}\n\n{{> alert}}{{/each}}",
);

const ALERT_TEMPLATE: &str = concat!(
  "{{#if firing}}🔥{{else}}✅{{/if}} <b>{{name}}</b>",
  "{{#if environment}}\n<b>Environment:</b> {{environment}}{{/if}}",
  "{{#if project}}\n<b>Project:</b> {{project}}{{/if}}",
  "{{#if severity}}\n<b>Severity:</b> {{severity}}{{/if}}",
  "{{#if summary}}\n{{summary}}{{/if}}",
  "{{#if description}}\n{{description}}{{/if}}",
  "{{#if starts_at}}\n<i>since {{starts_at}}</i>{{/if}}",
  "{{#if generator_url}}\n<a href=\"{{generator_url}}\">source</a>{{/if}}",
);

const ALERT_LIST_TEMPLATE: &str =
  "{{#each alerts}}{{#unless @first}}\n\n{{/unless}}{{> alert}}{{/each}}";

const SILENCE_LIST_TEMPLATE: &str = concat!(
  "{{#each silences}}{{#unless @first}}\n\n{{/unless}}",
  "🔕 <b>Silence</b> <code>{{id}}</code> ({{state}})",
  "\n{{#each matchers}}{{#unless @first}}, {{/unless}}<code>{{this}}</code>{{/each}}",
  "\nStarts: {{starts_at}}\nEnds: {{ends_at}}",
  "{{#if created_by}}\nCreated by: {{created_by}}{{/if}}",
  "{{#if comment}}\nComment: {{comment}}{{/if}}",
  "{{/each}}",
);

const STATUS_TEMPLATE: &str = concat!(
  "<b>Alertmanager</b>\nVersion: {{source_version}}\nUptime: {{source_uptime}}",
  "\n<b>Alertgram</b>\nVersion: {{revision}}\nUptime: {{uptime}}",
);

// ─── Template data ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct NotificationView<'a> {
  receiver:           &'a str,
  status:             AlertStatus,
  firing_batch:       bool,
  firing:             usize,
  total:              usize,
  group_labels:       &'a Labels,
  common_labels:      &'a Labels,
  common_annotations: &'a Labels,
  external_url:       &'a str,
  alerts:             Vec<AlertView<'a>>,
}

#[derive(Serialize)]
struct AlertView<'a> {
  name:          &'a str,
  status:        AlertStatus,
  firing:        bool,
  environment:   Option<&'a str>,
  project:       Option<&'a str>,
  severity:      Option<&'a str>,
  summary:       Option<String>,
  description:   Option<String>,
  labels:        &'a Labels,
  annotations:   Labels,
  starts_at:     Option<String>,
  ends_at:       Option<String>,
  generator_url: &'a str,
  fingerprint:   &'a str,
}

impl<'a> AlertView<'a> {
  fn new(alert: &'a Alert) -> Self {
    let annotations: Labels = alert
      .annotations
      .iter()
      .map(|(k, v)| (k.clone(), single_paragraph(v)))
      .collect();
    Self {
      name: alert.name(),
      status: alert.status,
      firing: alert.status == AlertStatus::Firing,
      environment: alert.environment(),
      project: alert.project(),
      severity: alert.label("severity"),
      summary: annotations.get("summary").cloned(),
      description: annotations.get("description").cloned(),
      labels: &alert.labels,
      annotations,
      starts_at: alert.starts_at.map(|t| t.format(TIME_FORMAT).to_string()),
      ends_at: alert.ends_at.map(|t| t.format(TIME_FORMAT).to_string()),
      generator_url: &alert.generator_url,
      fingerprint: &alert.fingerprint,
    }
  }
}

#[derive(Serialize)]
struct SilenceView<'a> {
  id:         &'a str,
  state:      &'a str,
  matchers:   Vec<String>,
  starts_at:  String,
  ends_at:    String,
  created_by: &'a str,
  comment:    String,
}

impl<'a> SilenceView<'a> {
  fn new(s: &'a Silence) -> Self {
    Self {
      id:         &s.id,
      state:      &s.status.state,
      matchers:   s.matchers.iter().map(|m| m.expression()).collect(),
      starts_at:  s.starts_at.format(TIME_FORMAT).to_string(),
      ends_at:    s.ends_at.format(TIME_FORMAT).to_string(),
      created_by: &s.created_by,
      comment:    single_paragraph(&s.comment),
    }
  }
}

// ─── Renderer ────────────────────────────────────────────────────────────────

/// Registry of the message templates.
#[derive(Clone, Debug)]
pub struct Renderer {
  registry: Handlebars<'static>,
}

impl Renderer {
  /// Built-in templates only.
  pub fn new() -> Result<Self> { Self::build(NOTIFICATION_TEMPLATE) }

  /// Built-in templates with `source` as the notification template.
  pub fn with_template(source: &str) -> Result<Self> { Self::build(source) }

  /// Built-in templates with the notification template read from `path`.
  pub fn from_file(path: &Path) -> Result<Self> {
    let source = std::fs::read_to_string(path)
      .map_err(|e| Error::Config(format!("cannot read template {}: {e}", path.display())))?;
    Self::with_template(&source)
  }

  fn build(notification: &str) -> Result<Self> {
    let mut registry = Handlebars::new();
    let templates = [
      (ALERT_PARTIAL, ALERT_TEMPLATE),
      (DEFAULT_TEMPLATE, notification),
      (ALERT_LIST, ALERT_LIST_TEMPLATE),
      (SILENCE_LIST, SILENCE_LIST_TEMPLATE),
      (STATUS, STATUS_TEMPLATE),
    ];
    for (name, source) in templates {
      registry
        .register_template_string(name, source)
        .map_err(|e| Error::Config(format!("invalid template {name}: {e}")))?;
    }
    Ok(Self { registry })
  }

  fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
    self.registry.render(name, data).map_err(|e| Error::Render(e.to_string()))
  }

  /// One message for one chat: a header line followed by each alert.
  pub fn notification(&self, n: &Notification) -> Result<String> {
    let view = NotificationView {
      receiver:           &n.receiver,
      status:             n.status,
      firing_batch:       n.status == AlertStatus::Firing,
      firing:             n.alerts.iter().filter(|a| a.status == AlertStatus::Firing).count(),
      total:              n.alerts.len(),
      group_labels:       &n.group_labels,
      common_labels:      &n.common_labels,
      common_annotations: &n.common_annotations,
      external_url:       &n.external_url,
      alerts:             n.alerts.iter().map(AlertView::new).collect(),
    };
    self.render(DEFAULT_TEMPLATE, &view)
  }

  /// A bare list of alerts, as answered to `/alerts`.
  pub fn alert_list(&self, alerts: &[Alert]) -> Result<String> {
    let alerts: Vec<AlertView<'_>> = alerts.iter().map(AlertView::new).collect();
    self.render(ALERT_LIST, &json!({ "alerts": alerts }))
  }

  /// One silence per block, as answered to `/silences`.
  pub fn silence_list(&self, silences: &[Silence]) -> Result<String> {
    let silences: Vec<SilenceView<'_>> = silences.iter().map(SilenceView::new).collect();
    self.render(SILENCE_LIST, &json!({ "silences": silences }))
  }

  /// The `/status` reply.
  pub fn status(
    &self,
    source_version: &str,
    source_uptime: DateTime<Utc>,
    revision: &str,
    start_time: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> Result<String> {
    let data = json!({
      "source_version": source_version,
      "source_uptime": duration(now - source_uptime),
      "revision": revision,
      "uptime": duration(now - start_time),
    });
    self.render(STATUS, &data)
  }
}

/// Human readable duration in whole seconds, e.g. `1day 2h 3m`.
pub fn duration(d: TimeDelta) -> String {
  let secs = u64::try_from(d.num_seconds()).unwrap_or(0);
  humantime::format_duration(std::time::Duration::from_secs(secs)).to_string()
}

/// Collapse blank lines so an annotation cannot split an alert block.
fn single_paragraph(text: &str) -> String {
  text
    .lines()
    .map(str::trim_end)
    .filter(|l| !l.trim().is_empty())
    .collect::<Vec<_>>()
    .join("\n")
}
