//! Periodic deletion of delivered notifications.

use alertgram_core::{source::AlertSource, store::ChatStore, transport::Transport};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{Bot, Error, Result};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  pub deleted: usize,
  pub failed:  usize,
}

impl<S, T, A> Bot<S, T, A>
where
  S: ChatStore + 'static,
  T: Transport + 'static,
  A: AlertSource + 'static,
{
  /// Take every message older than the delete period from the store and
  /// delete it from its chat.
  ///
  /// Taken records are gone from the store even if the chat-side delete
  /// fails; such failures are logged and counted.
  pub async fn sweep(&self) -> Result<SweepReport> {
    let expired = self
      .store
      .list_messages_older_than(self.settings.delete_period)
      .await
      .map_err(Error::store)?;

    let mut report = SweepReport::default();
    for message in &expired {
      match self.transport.delete(message).await {
        Ok(()) => {
          self.metrics.message_deleted();
          report.deleted += 1;
        }
        Err(e) => {
          tracing::warn!(
            chat_id = message.chat_id,
            message_id = message.message_id,
            error = %e,
            "cannot delete message"
          );
          report.failed += 1;
        }
      }
    }
    Ok(report)
  }

  /// Sweep every fetch period until cancelled. A slow sweep delays the next
  /// tick instead of overlapping with it.
  pub(crate) async fn sweep_loop(&self, cancel: CancellationToken) -> Result<()> {
    let mut interval = tokio::time::interval(self.settings.fetch_period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; the first sweep waits one period.
    interval.tick().await;

    loop {
      tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        _ = interval.tick() => {}
      }

      match self.sweep().await {
        Ok(report) if report == SweepReport::default() => {}
        Ok(report) => {
          tracing::info!(deleted = report.deleted, failed = report.failed, "sweep finished")
        }
        Err(e) => tracing::warn!(error = %e, "cannot find messages to delete"),
      }
    }
  }
}
