//! Prometheus metrics for the relay.
//!
//! One [`Metrics`] handle is built at startup and passed to the fan-out loop,
//! the sweeper, the command handlers and the webhook router.

use std::sync::Arc;

use prometheus_client::{
  encoding::{EncodeLabelSet, text::encode},
  metrics::{counter::Counter, family::Family},
  registry::Registry,
};

/// Content type of the `/metrics` response.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Label used for commands from senders that are not admins.
pub const DROPPED: &str = "dropped";

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CommandLabels {
  pub command: String,
}

#[derive(Clone, Debug)]
pub struct Metrics {
  registry:         Arc<Registry>,
  commands:         Family<CommandLabels, Counter>,
  webhooks:         Counter,
  messages_sent:    Counter,
  send_failures:    Counter,
  record_failures:  Counter,
  messages_deleted: Counter,
}

impl Default for Metrics {
  fn default() -> Self { Self::new() }
}

impl Metrics {
  pub fn new() -> Self {
    let mut registry = Registry::with_prefix("alertgram");

    let commands = Family::<CommandLabels, Counter>::default();
    registry.register(
      "commands",
      "Number of commands received by command name",
      commands.clone(),
    );
    let webhooks = Counter::default();
    registry.register("webhooks", "Number of webhook batches received", webhooks.clone());
    let messages_sent = Counter::default();
    registry.register(
      "messages_sent",
      "Number of notifications delivered to chats",
      messages_sent.clone(),
    );
    let send_failures = Counter::default();
    registry.register(
      "send_failures",
      "Number of notifications that could not be delivered",
      send_failures.clone(),
    );
    let record_failures = Counter::default();
    registry.register(
      "record_failures",
      "Number of delivered notifications that could not be recorded for deletion",
      record_failures.clone(),
    );
    let messages_deleted = Counter::default();
    registry.register(
      "messages_deleted",
      "Number of expired notifications deleted from chats",
      messages_deleted.clone(),
    );

    Self {
      registry: Arc::new(registry),
      commands,
      webhooks,
      messages_sent,
      send_failures,
      record_failures,
      messages_deleted,
    }
  }

  pub fn command(&self, command: &str) {
    self
      .commands
      .get_or_create(&CommandLabels { command: command.to_owned() })
      .inc();
  }

  #[cfg(test)]
  pub fn command_count(&self, command: &str) -> u64 {
    self
      .commands
      .get_or_create(&CommandLabels { command: command.to_owned() })
      .get()
  }

  pub fn webhook(&self) { self.webhooks.inc(); }

  pub fn message_sent(&self) { self.messages_sent.inc(); }

  pub fn send_failure(&self) { self.send_failures.inc(); }

  pub fn record_failure(&self) { self.record_failures.inc(); }

  pub fn message_deleted(&self) { self.messages_deleted.inc(); }

  /// Render every registered metric in the Prometheus text format.
  pub fn encode(&self) -> String {
    let mut buffer = String::new();
    if let Err(e) = encode(&mut buffer, &self.registry) {
      tracing::error!(error = %e, "failed to encode metrics");
      return String::new();
    }
    buffer
  }
}
