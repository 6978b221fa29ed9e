//! Runtime configuration.
//!
//! [`ServerConfig`] is what the binary deserialises from `config.toml` and
//! `ALERTGRAM_*` environment variables. [`Settings`] is the validated subset
//! the relay itself runs on.

use std::{collections::BTreeSet, path::PathBuf, time::Duration};

use alertgram_core::{message::minutes, universe::Universe};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use crate::{Error, Result, render::Renderer};

// ─── Raw configuration ───────────────────────────────────────────────────────

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  #[serde(default = "default_listen_addr")]
  pub listen_addr:      String,
  pub store_path:       PathBuf,
  pub telegram_token:   String,
  #[serde(default = "default_telegram_api_url")]
  pub telegram_api_url: String,
  #[serde(default = "default_alertmanager_url")]
  pub alertmanager_url: String,
  /// Only list alerts routed to this receiver in `/alerts`.
  #[serde(default)]
  pub receiver:         Option<String>,
  pub admins:           Vec<i64>,
  #[serde(default)]
  pub environments:     Vec<String>,
  #[serde(default)]
  pub projects:         Vec<String>,
  /// Minutes between deletion sweeps.
  #[serde(default = "default_fetch_period")]
  pub fetch_period:     f64,
  /// Minutes a delivered notification stays in the chat.
  #[serde(default = "default_delete_period")]
  pub delete_period:    f64,
  /// Handlebars template replacing the built-in notification layout.
  #[serde(default)]
  pub template_path:    Option<PathBuf>,
  /// Username the bot answers to in `/command@username`. Asked from
  /// Telegram at startup when unset.
  #[serde(default)]
  pub bot_username:     Option<String>,
}

fn default_listen_addr() -> String { "127.0.0.1:8080".to_owned() }

fn default_telegram_api_url() -> String { "https://api.telegram.org".to_owned() }

fn default_alertmanager_url() -> String { "http://localhost:9093".to_owned() }

fn default_fetch_period() -> f64 { 1.0 }

fn default_delete_period() -> f64 { 1440.0 }

// ─── Validated settings ──────────────────────────────────────────────────────

/// Everything the bot needs at runtime, checked once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
  pub admins:        BTreeSet<i64>,
  pub universe:      Universe,
  pub receiver:      Option<String>,
  pub fetch_period:  Duration,
  pub delete_period: TimeDelta,
  pub revision:      String,
  pub start_time:    DateTime<Utc>,
  pub renderer:      Renderer,
  /// Commands addressed to another `@username` are ignored.
  pub bot_username:  Option<String>,
}

impl Settings {
  pub fn new(
    config: &ServerConfig,
    revision: impl Into<String>,
    start_time: DateTime<Utc>,
  ) -> Result<Self> {
    if config.admins.is_empty() {
      return Err(Error::Config("at least one admin id is required".into()));
    }
    let fetch_period = positive_minutes("fetch_period", config.fetch_period)?;
    let delete_period = positive_minutes("delete_period", config.delete_period)?;
    let universe = Universe::new(&config.environments, &config.projects)
      .map_err(|e| Error::Config(e.to_string()))?;
    let renderer = match &config.template_path {
      Some(path) => Renderer::from_file(path)?,
      None => Renderer::new()?,
    };

    Ok(Self {
      admins: config.admins.iter().copied().collect(),
      universe,
      receiver: config.receiver.clone().filter(|r| !r.is_empty()),
      fetch_period: fetch_period
        .to_std()
        .map_err(|e| Error::Config(format!("fetch_period: {e}")))?,
      delete_period,
      revision: revision.into(),
      start_time,
      renderer,
      bot_username: config
        .bot_username
        .as_deref()
        .map(|name| name.trim_start_matches('@').to_owned())
        .filter(|name| !name.is_empty()),
    })
  }

  pub fn is_admin(&self, user_id: i64) -> bool { self.admins.contains(&user_id) }
}

fn positive_minutes(name: &str, value: f64) -> Result<TimeDelta> {
  if !value.is_finite() || value <= 0.0 {
    return Err(Error::Config(format!(
      "{name} must be a positive number of minutes, got {value}"
    )));
  }
  let period = minutes(value);
  if period <= TimeDelta::zero() {
    return Err(Error::Config(format!("{name} is shorter than a millisecond")));
  }
  Ok(period)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config() -> ServerConfig {
    ServerConfig {
      listen_addr:      default_listen_addr(),
      store_path:       PathBuf::from(":memory:"),
      telegram_token:   "token".into(),
      telegram_api_url: default_telegram_api_url(),
      alertmanager_url: default_alertmanager_url(),
      receiver:         None,
      admins:           vec![42],
      environments:     vec!["prod".into(), " staging ".into()],
      projects:         vec!["billing".into()],
      fetch_period:     0.5,
      delete_period:    60.0,
      template_path:    None,
      bot_username:     Some("@alertgram_bot".into()),
    }
  }

  #[test]
  fn builds_settings() {
    let settings = Settings::new(&config(), "v1", Utc::now()).unwrap();
    assert!(settings.is_admin(42));
    assert!(!settings.is_admin(7));
    assert_eq!(settings.fetch_period, Duration::from_secs(30));
    assert_eq!(settings.delete_period, TimeDelta::hours(1));
    assert!(settings.universe.environments().contains("staging"));
    assert!(settings.universe.environments().contains("other"));
    assert!(settings.universe.projects().contains("other"));
    assert_eq!(settings.bot_username.as_deref(), Some("alertgram_bot"));
  }

  #[test]
  fn rejects_missing_admins() {
    let mut c = config();
    c.admins.clear();
    assert!(matches!(Settings::new(&c, "v1", Utc::now()), Err(Error::Config(_))));
  }

  #[test]
  fn rejects_non_positive_periods() {
    let mut c = config();
    c.fetch_period = 0.0;
    assert!(Settings::new(&c, "v1", Utc::now()).is_err());

    let mut c = config();
    c.delete_period = f64::NAN;
    assert!(Settings::new(&c, "v1", Utc::now()).is_err());
  }

  #[test]
  fn rejects_unaddressable_tags() {
    let mut c = config();
    c.projects.push("has space".into());
    assert!(matches!(Settings::new(&c, "v1", Utc::now()), Err(Error::Config(_))));
  }

  #[test]
  fn empty_receiver_means_all() {
    let mut c = config();
    c.receiver = Some(String::new());
    assert_eq!(Settings::new(&c, "v1", Utc::now()).unwrap().receiver, None);
  }

  #[test]
  fn missing_template_file_is_rejected() {
    let mut c = config();
    c.template_path = Some(PathBuf::from("/nonexistent/alertgram/telegram.hbs"));
    assert!(matches!(Settings::new(&c, "v1", Utc::now()), Err(Error::Config(_))));
  }

  #[test]
  fn deserializes_with_defaults() {
    let raw = r#"{
      "store_path": "/tmp/alertgram.db",
      "telegram_token": "t",
      "admins": [1, 2]
    }"#;
    let c: ServerConfig = serde_json::from_str(raw).unwrap();
    assert_eq!(c.listen_addr, "127.0.0.1:8080");
    assert_eq!(c.alertmanager_url, "http://localhost:9093");
    assert_eq!(c.fetch_period, 1.0);
    assert!(c.environments.is_empty());
    assert_eq!(c.template_path, None);
    assert_eq!(c.bot_username, None);
  }
}
