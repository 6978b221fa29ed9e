//! The alert source boundary (Alertmanager's query API).

use std::future::Future;

use crate::alert::{Alert, Silence, SourceStatus};

pub trait AlertSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Current alerts, optionally restricted to one receiver.
  fn list_alerts<'a>(
    &'a self,
    receiver: Option<&'a str>,
    include_silenced: bool,
  ) -> impl Future<Output = Result<Vec<Alert>, Self::Error>> + Send + 'a;

  fn list_silences(
    &self,
  ) -> impl Future<Output = Result<Vec<Silence>, Self::Error>> + Send + '_;

  fn status(&self) -> impl Future<Output = Result<SourceStatus, Self::Error>> + Send + '_;
}
