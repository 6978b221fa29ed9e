//! Alertmanager v2 API client.

use std::time::Duration;

use alertgram_core::{
  alert::{Alert, AlertStatus, Labels, Silence, SourceStatus},
  source::AlertSource,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, de::DeserializeOwned};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum AlertmanagerError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),
  #[error("alertmanager returned {status} for {path}")]
  Status { status: reqwest::StatusCode, path: &'static str },
}

#[derive(Debug, Clone)]
pub struct AlertmanagerClient {
  client:   reqwest::Client,
  base_url: String,
}

impl AlertmanagerClient {
  pub fn new(base_url: &str) -> Result<Self, AlertmanagerError> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned() })
  }

  async fn get<R: DeserializeOwned>(
    &self,
    path: &'static str,
    query: &[(&str, String)],
  ) -> Result<R, AlertmanagerError> {
    let response = self
      .client
      .get(format!("{}{path}", self.base_url))
      .query(query)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      tracing::warn!(%status, path, "alertmanager request failed");
      return Err(AlertmanagerError::Status { status, path });
    }
    Ok(response.json().await?)
  }
}

impl AlertSource for AlertmanagerClient {
  type Error = AlertmanagerError;

  async fn list_alerts(
    &self,
    receiver: Option<&str>,
    include_silenced: bool,
  ) -> Result<Vec<Alert>, AlertmanagerError> {
    let mut query = vec![
      ("active", "true".to_owned()),
      ("silenced", include_silenced.to_string()),
      ("inhibited", include_silenced.to_string()),
    ];
    if let Some(receiver) = receiver {
      query.push(("receiver", receiver.to_owned()));
    }

    let alerts: Vec<GettableAlert> = self.get("/api/v2/alerts", &query).await?;
    Ok(alerts.into_iter().map(Alert::from).collect())
  }

  async fn list_silences(&self) -> Result<Vec<Silence>, AlertmanagerError> {
    self.get("/api/v2/silences", &[]).await
  }

  async fn status(&self) -> Result<SourceStatus, AlertmanagerError> {
    let status: AlertmanagerStatus = self.get("/api/v2/status", &[]).await?;
    Ok(SourceStatus { version: status.version_info.version, uptime: status.uptime })
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GettableAlert {
  #[serde(default)]
  labels:        Labels,
  #[serde(default)]
  annotations:   Labels,
  starts_at:     Option<DateTime<Utc>>,
  ends_at:       Option<DateTime<Utc>>,
  #[serde(default, rename = "generatorURL")]
  generator_url: String,
  #[serde(default)]
  fingerprint:   String,
}

impl From<GettableAlert> for Alert {
  fn from(a: GettableAlert) -> Self {
    // The API only reports alerts that are still active.
    Alert {
      status:        AlertStatus::Firing,
      labels:        a.labels,
      annotations:   a.annotations,
      starts_at:     a.starts_at,
      ends_at:       a.ends_at,
      generator_url: a.generator_url,
      fingerprint:   a.fingerprint,
    }
  }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertmanagerStatus {
  version_info: VersionInfo,
  uptime:       DateTime<Utc>,
}

#[derive(Deserialize)]
struct VersionInfo {
  version: String,
}
