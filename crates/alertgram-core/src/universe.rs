//! The configured universe of environment and project tags.

use std::collections::BTreeSet;

use crate::{Error, Result};

/// Catch-all tag for alerts whose label is missing or not configured.
pub const OTHER: &str = "other";

/// Alert label carrying the environment tag.
pub const ENVIRONMENT_LABEL: &str = "environment";
/// Alert label carrying the project tag.
pub const PROJECT_LABEL: &str = "project";

/// Known environments and projects, each always including [`OTHER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
  environments: BTreeSet<String>,
  projects:     BTreeSet<String>,
}

impl Universe {
  /// Build a universe from configured tags.
  ///
  /// Surrounding whitespace is stripped and empty entries are skipped. Tags
  /// must consist of word characters, otherwise they could never be named in
  /// a mute command.
  pub fn new<E, P>(environments: E, projects: P) -> Result<Self>
  where
    E: IntoIterator,
    E::Item: AsRef<str>,
    P: IntoIterator,
    P::Item: AsRef<str>,
  {
    Ok(Self {
      environments: collect_tags(environments)?,
      projects:     collect_tags(projects)?,
    })
  }

  pub fn environments(&self) -> &BTreeSet<String> { &self.environments }

  pub fn projects(&self) -> &BTreeSet<String> { &self.projects }

  /// Classify an alert's environment label, coercing unknown values to
  /// [`OTHER`].
  pub fn resolve_environment<'a>(&'a self, label: Option<&'a str>) -> &'a str {
    resolve(&self.environments, label)
  }

  /// Classify an alert's project label, coercing unknown values to
  /// [`OTHER`].
  pub fn resolve_project<'a>(&'a self, label: Option<&'a str>) -> &'a str {
    resolve(&self.projects, label)
  }
}

fn resolve<'a>(known: &BTreeSet<String>, label: Option<&'a str>) -> &'a str {
  match label {
    Some(tag) if known.contains(tag) => tag,
    _ => OTHER,
  }
}

fn collect_tags<I>(tags: I) -> Result<BTreeSet<String>>
where
  I: IntoIterator,
  I::Item: AsRef<str>,
{
  let mut out = BTreeSet::new();
  for tag in tags {
    let tag = tag.as_ref().trim();
    if tag.is_empty() {
      continue;
    }
    if !tag.chars().all(|c| c.is_alphanumeric() || c == '_') {
      return Err(Error::InvalidTag(tag.to_owned()));
    }
    out.insert(tag.to_owned());
  }
  out.insert(OTHER.to_owned());
  Ok(out)
}
