//! References to sent messages, kept until they are old enough to delete.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A message the relay delivered and will later delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
  pub message_id: i64,
  pub chat_id:    i64,
  pub sent_at:    DateTime<Utc>,
}

impl MessageRecord {
  /// Whether at least `age` has passed between `sent_at` and `now`.
  pub fn is_expired(&self, now: DateTime<Utc>, age: TimeDelta) -> bool {
    now.signed_duration_since(self.sent_at) >= age
  }
}

/// Convert a period in (possibly fractional) minutes into a [`TimeDelta`].
pub fn minutes(value: f64) -> TimeDelta {
  TimeDelta::milliseconds((value * 60_000.0).round() as i64)
}
