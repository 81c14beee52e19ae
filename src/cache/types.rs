//! Core types for the catalog cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogPayload;

/// Which tier produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
  /// Fetched from the remote catalog endpoint
  Remote,
  /// Loaded from the bundled fallback file
  Local,
  /// Served from the persisted cache with no better information
  Cache,
}

impl Provenance {
  pub fn as_str(&self) -> &'static str {
    match self {
      Provenance::Remote => "remote",
      Provenance::Local => "local",
      Provenance::Cache => "cache",
    }
  }

  /// Parse a stored provenance tag. Unknown or missing tags read as `Cache`.
  pub fn from_tag(tag: Option<&str>) -> Self {
    match tag.map(str::trim) {
      Some("remote") => Provenance::Remote,
      Some("local") => Provenance::Local,
      _ => Provenance::Cache,
    }
  }
}

impl std::fmt::Display for Provenance {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A usable cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  pub fetched_at: DateTime<Utc>,
  pub payload: CatalogPayload,
  /// Stored next to the envelope, not inside it
  pub source: Provenance,
}

/// Outcome of reading the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRead {
  Hit(CacheEntry),
  /// Nothing stored under the current key
  Absent,
  /// Something is stored but cannot be used
  Corrupt(String),
}

impl CacheRead {
  /// Collapse to an entry, treating corrupt data like a cold cache.
  pub fn into_entry(self) -> Option<CacheEntry> {
    match self {
      CacheRead::Hit(entry) => Some(entry),
      CacheRead::Absent | CacheRead::Corrupt(_) => None,
    }
  }
}

/// The persisted envelope. `source` lives under a companion key.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredEnvelope {
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub fetched_at: DateTime<Utc>,
  pub payload: CatalogPayload,
}

/// A payload together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
  pub payload: CatalogPayload,
  pub provenance: Provenance,
  /// When the data was cached (only for cache hits)
  pub fetched_at: Option<DateTime<Utc>>,
}

impl Resolved {
  /// A payload that was just fetched from `provenance`.
  pub fn fetched(payload: CatalogPayload, provenance: Provenance) -> Self {
    Self {
      payload,
      provenance,
      fetched_at: None,
    }
  }

  /// A payload served from the cache.
  pub fn from_cache(entry: CacheEntry) -> Self {
    Self {
      payload: entry.payload,
      provenance: entry.source,
      fetched_at: Some(entry.fetched_at),
    }
  }

  pub fn is_cached(&self) -> bool {
    self.fetched_at.is_some()
  }
}
