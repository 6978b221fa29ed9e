//! Mute sets: the per-dimension filter state of a subscribed chat.
//!
//! A [`MuteSet`] keeps three sets for one dimension (environments or
//! projects): the universe of known tags, the tags the chat muted, and the
//! derived alert set `all − muted`. The derived set is recomputed on every
//! mutation and cannot be written directly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ─── Set helpers ─────────────────────────────────────────────────────────────

/// Elements of `all` that are not in `excluded`.
pub fn difference(
  all: &BTreeSet<String>,
  excluded: &BTreeSet<String>,
) -> BTreeSet<String> {
  all.difference(excluded).cloned().collect()
}

/// Deduplicated union of `existing` and `additions`.
///
/// The result is a set; callers must not depend on the order in which
/// `additions` were supplied.
pub fn union_unique<I, S>(existing: &BTreeSet<String>, additions: I) -> BTreeSet<String>
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  let mut out = existing.clone();
  out.extend(additions.into_iter().map(Into::into));
  out
}

// ─── MuteSet ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuteSet {
  /// Universe snapshot, refreshed by every mutation.
  all:   BTreeSet<String>,
  muted: BTreeSet<String>,
  /// Always `all − muted`.
  alert: BTreeSet<String>,
}

impl MuteSet {
  /// A fresh set with nothing muted: every tag of `universe` is alerting.
  pub fn new(universe: &BTreeSet<String>) -> Self {
    Self {
      all:   universe.clone(),
      muted: BTreeSet::new(),
      alert: universe.clone(),
    }
  }

  pub fn all(&self) -> &BTreeSet<String> { &self.all }

  pub fn muted(&self) -> &BTreeSet<String> { &self.muted }

  pub fn alert(&self) -> &BTreeSet<String> { &self.alert }

  /// Whether alerts tagged `tag` pass this filter.
  pub fn accepts(&self, tag: &str) -> bool { self.alert.contains(tag) }

  /// Add `tags` to the muted set. Already-muted tags are left alone.
  pub fn mute<I, S>(&mut self, tags: I, universe: &BTreeSet<String>)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.muted = union_unique(&self.muted, tags);
    self.refresh(universe);
  }

  /// Remove `tag` from the muted set.
  ///
  /// Returns `false` and leaves the muted set untouched if `tag` was not
  /// muted. The alert set is still recomputed against `universe`.
  pub fn unmute(&mut self, tag: &str, universe: &BTreeSet<String>) -> bool {
    let removed = self.muted.remove(tag);
    self.refresh(universe);
    removed
  }

  fn refresh(&mut self, universe: &BTreeSet<String>) {
    self.all = universe.clone();
    self.alert = difference(&self.all, &self.muted);
  }
}
