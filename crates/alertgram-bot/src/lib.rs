//! Alertmanager to Telegram relay.
//!
//! A [`Bot`] ties a [`ChatStore`], a [`Transport`] and an [`AlertSource`]
//! together and runs three loops on one cancellation token: webhook fan-out,
//! the deletion sweep and command polling. The webhook HTTP side lives in
//! [`webhook`] and feeds the fan-out loop through a channel.

pub mod alertmanager;
pub mod commands;
pub mod config;
pub mod error;
pub mod fanout;
pub mod metrics;
pub mod render;
pub mod sweeper;
pub mod telegram;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

use std::sync::Arc;

use alertgram_core::{
  alert::WebhookMessage, source::AlertSource, store::ChatStore, transport::Transport,
};
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;

use config::Settings;
use metrics::Metrics;

// ─── Bot ─────────────────────────────────────────────────────────────────────

/// Shared handle for the relay. Cloning is cheap.
pub struct Bot<S, T, A> {
  store:     Arc<S>,
  transport: Arc<T>,
  source:    Arc<A>,
  settings:  Arc<Settings>,
  metrics:   Metrics,
}

impl<S, T, A> Clone for Bot<S, T, A> {
  fn clone(&self) -> Self {
    Self {
      store:     Arc::clone(&self.store),
      transport: Arc::clone(&self.transport),
      source:    Arc::clone(&self.source),
      settings:  Arc::clone(&self.settings),
      metrics:   self.metrics.clone(),
    }
  }
}

impl<S, T, A> Bot<S, T, A>
where
  S: ChatStore + 'static,
  T: Transport + 'static,
  A: AlertSource + 'static,
{
  pub fn new(store: S, transport: T, source: A, settings: Settings, metrics: Metrics) -> Self {
    Self {
      store:     Arc::new(store),
      transport: Arc::new(transport),
      source:    Arc::new(source),
      settings:  Arc::new(settings),
      metrics,
    }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn settings(&self) -> &Settings { &self.settings }

  pub fn metrics(&self) -> &Metrics { &self.metrics }

  /// Run fan-out, sweep and polling until `cancel` fires or one of them
  /// stops. Whichever task exits first cancels the others; the first error
  /// is returned once all of them have finished.
  pub async fn run(
    self,
    cancel: CancellationToken,
    webhooks: mpsc::Receiver<WebhookMessage>,
  ) -> Result<()> {
    let mut tasks = JoinSet::new();

    let (bot, token) = (self.clone(), cancel.clone());
    tasks.spawn(async move { ("fanout", bot.fanout_loop(token, webhooks).await) });
    let (bot, token) = (self.clone(), cancel.clone());
    tasks.spawn(async move { ("sweep", bot.sweep_loop(token).await) });
    let (bot, token) = (self, cancel.clone());
    tasks.spawn(async move { ("poll", bot.poll_loop(token).await) });

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
      cancel.cancel();
      match joined {
        Ok((task, Ok(()))) => tracing::info!(task, "task stopped"),
        Ok((task, Err(e))) => {
          tracing::error!(task, error = %e, "task failed");
          first_error.get_or_insert(e);
        }
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => tracing::error!(error = %e, "task aborted"),
      }
    }

    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }
}
