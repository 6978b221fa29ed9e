//! Notification fan-out: one webhook batch in, one message per chat out.

use std::collections::BTreeMap;

use alertgram_core::{
  alert::{Alert, Notification, WebhookMessage},
  chat::ChatRecord,
  source::AlertSource,
  store::ChatStore,
  text::{MAX_MESSAGE_LEN, truncate_message},
  transport::{ParseMode, Transport},
  universe::Universe,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{Bot, Error, Result};

/// Outcome of dispatching one webhook batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
  /// Chats that received their notification.
  pub delivered:  usize,
  /// Chats whose notification could not be rendered or sent.
  pub failed:     usize,
  /// Delivered notifications that were not recorded, so the sweep will never
  /// delete them. Counted in `delivered` too.
  pub unrecorded: usize,
}

/// What became of a notification that reached its chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
  Recorded,
  Unrecorded,
}

/// Group `alerts` by every chat whose filters accept them.
///
/// Each alert is classified once against `universe`; alerts keep their batch
/// order within a chat and are not deduplicated.
pub fn route(
  alerts: &[Alert],
  chats: &[ChatRecord],
  universe: &Universe,
) -> BTreeMap<i64, Vec<Alert>> {
  let mut routed: BTreeMap<i64, Vec<Alert>> = BTreeMap::new();
  for alert in alerts {
    let environment = universe.resolve_environment(alert.environment());
    let project = universe.resolve_project(alert.project());
    for chat in chats.iter().filter(|c| c.accepts(environment, project)) {
      routed.entry(chat.chat_id).or_default().push(alert.clone());
    }
  }
  routed
}

impl<S, T, A> Bot<S, T, A>
where
  S: ChatStore + 'static,
  T: Transport + 'static,
  A: AlertSource + 'static,
{
  /// Deliver one webhook batch to every interested chat.
  ///
  /// The chat list is read once. A failure for one chat is logged and
  /// counted; the remaining chats are still served.
  pub async fn dispatch(&self, webhook: &WebhookMessage) -> Result<DispatchReport> {
    let chats = self.store.list_chats().await.map_err(Error::store)?;
    let routed = route(&webhook.alerts, &chats, &self.settings.universe);

    let mut report = DispatchReport::default();
    for (chat_id, alerts) in routed {
      let notification = Notification { alerts, ..Notification::for_batch(webhook) };
      let text = match self.settings.renderer.notification(&notification) {
        Ok(text) => text,
        Err(e) => {
          tracing::warn!(chat_id, error = %e, "failed to render notification");
          self.metrics.send_failure();
          report.failed += 1;
          continue;
        }
      };
      match self.deliver(chat_id, &text).await {
        Ok(Delivery::Recorded) => report.delivered += 1,
        Ok(Delivery::Unrecorded) => {
          report.delivered += 1;
          report.unrecorded += 1;
        }
        Err(e) => {
          tracing::warn!(chat_id, error = %e, "failed to deliver notification");
          self.metrics.send_failure();
          report.failed += 1;
        }
      }
    }
    Ok(report)
  }

  /// Send one rendered notification and remember it for deletion.
  ///
  /// Only a failed send is an error. Once Telegram has accepted the message
  /// a failure to record it is logged and reported as
  /// [`Delivery::Unrecorded`].
  async fn deliver(&self, chat_id: i64, text: &str) -> Result<Delivery> {
    if text.len() > MAX_MESSAGE_LEN {
      tracing::warn!(chat_id, len = text.len(), "notification too long, truncating");
    }
    let text = truncate_message(text);
    let message = self
      .transport
      .send(chat_id, &text, ParseMode::Html)
      .await
      .map_err(Error::transport)?;
    self.metrics.message_sent();

    let message_id = message.message_id;
    match self.store.add_message(message).await {
      Ok(()) => Ok(Delivery::Recorded),
      Err(e) => {
        tracing::warn!(
          chat_id,
          message_id,
          error = %e,
          "notification delivered but not recorded, it will not be deleted"
        );
        self.metrics.record_failure();
        Ok(Delivery::Unrecorded)
      }
    }
  }

  pub(crate) async fn fanout_loop(
    &self,
    cancel: CancellationToken,
    mut webhooks: mpsc::Receiver<WebhookMessage>,
  ) -> Result<()> {
    loop {
      let webhook = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        next = webhooks.recv() => match next {
          Some(webhook) => webhook,
          None => {
            tracing::info!("webhook channel closed");
            return Ok(());
          }
        },
      };

      match self.dispatch(&webhook).await {
        Ok(report) => tracing::info!(
          alerts = webhook.alerts.len(),
          delivered = report.delivered,
          failed = report.failed,
          unrecorded = report.unrecorded,
          "webhook dispatched"
        ),
        Err(e) => tracing::error!(error = %e, "failed to read chats, dropping webhook batch"),
      }
    }
  }
}
