//! Typed catalog cache on top of a key/value store.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use super::kv::KeyValueStore;
use super::types::{CacheEntry, CacheRead, Provenance, StoredEnvelope};
use crate::catalog::CatalogPayload;

pub const DEFAULT_KEY: &str = "catalog";
pub const DEFAULT_VERSION: &str = "v1";
const SOURCE_SUFFIX: &str = ":source";

/// Catalog cache.
///
/// The envelope `{fetchedAt, payload}` lives under `<key>:<version>` and the
/// provenance tag under `<key>:<version>:source`. Bumping the version makes
/// every older entry unreachable.
pub struct CacheStore {
  kv: Arc<dyn KeyValueStore>,
  /// How long before cached data is considered stale
  ttl: Duration,
  key: String,
}

impl CacheStore {
  /// Create a cache over `kv` with the default key and a one hour TTL.
  pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
    Self {
      kv,
      ttl: Duration::hours(1),
      key: format!("{}:{}", DEFAULT_KEY, DEFAULT_VERSION),
    }
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  /// Use `<key>:<version>` as the primary key.
  pub fn with_key(mut self, key: &str, version: &str) -> Self {
    self.key = format!("{}:{}", key, version);
    self
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  fn source_key(&self) -> String {
    format!("{}{}", self.key, SOURCE_SUFFIX)
  }

  /// Read the stored entry. Never fails; problems surface as `Corrupt`.
  pub fn read(&self) -> CacheRead {
    let raw = match self.kv.get(&self.key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return CacheRead::Absent,
      Err(e) => return CacheRead::Corrupt(e.to_string()),
    };

    let envelope: StoredEnvelope = match serde_json::from_str(&raw) {
      Ok(envelope) => envelope,
      Err(e) => return CacheRead::Corrupt(format!("undecodable cache entry: {}", e)),
    };

    // A missing tag is expected after a crash between the two writes
    let tag = self.kv.get(&self.source_key()).ok().flatten();

    CacheRead::Hit(CacheEntry {
      fetched_at: envelope.fetched_at,
      payload: envelope.payload,
      source: Provenance::from_tag(tag.as_deref()),
    })
  }

  /// Store `payload` as fetched now.
  pub fn write(&self, payload: &CatalogPayload, source: Provenance) -> Result<()> {
    self.write_at(payload, source, Utc::now())
  }

  /// Store `payload` with an explicit fetch time.
  ///
  /// The envelope is serialized up front and written with a single `set`,
  /// so a failed write leaves the previous payload in place. The old tag is
  /// dropped first; if the tag write then fails the entry reads as `Cache`.
  pub fn write_at(
    &self,
    payload: &CatalogPayload,
    source: Provenance,
    fetched_at: DateTime<Utc>,
  ) -> Result<()> {
    let envelope = StoredEnvelope {
      fetched_at,
      payload: payload.clone(),
    };
    let raw =
      serde_json::to_string(&envelope).map_err(|e| eyre!("Failed to serialize cache entry: {}", e))?;

    let source_key = self.source_key();
    self.kv.remove(&source_key)?;
    self.kv.set(&self.key, &raw)?;
    self.kv.set(&source_key, source.as_str())?;
    Ok(())
  }

  /// Drop the entry under the current key.
  pub fn clear(&self) -> Result<()> {
    self.kv.remove(&self.key)?;
    self.kv.remove(&self.source_key())
  }

  /// Check whether an entry is younger than the TTL.
  pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
    Utc::now() - entry.fetched_at < self.ttl
  }
}
