//! Tiered catalog loading: cache, then remote, then the bundled file.

use color_eyre::Result;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::fetch::{CatalogFetcher, FallbackSource};
use super::revalidate::Revalidator;
use super::types::CatalogPayload;
use crate::cache::{CacheRead, CacheStore, KeyValueStore, Provenance, Resolved, SqliteKv};
use crate::config::Config;
use crate::error::CatalogError;
use crate::events::{CatalogEvent, EventChannel, SourceKind};

/// Catalog loader with stale-while-revalidate caching.
///
/// A fresh cache entry is returned without touching the network; the remote
/// endpoint (if any) is then polled in the background. Stale, missing or
/// forced loads go to the remote endpoint and fall back to the bundled file.
pub struct SourceResolver {
  store: Arc<CacheStore>,
  fetcher: CatalogFetcher,
  remote: Option<Url>,
  fallback: FallbackSource,
  events: EventChannel,
  revalidator: Option<Revalidator>,
  pending: Mutex<Option<JoinHandle<()>>>,
}

impl SourceResolver {
  pub fn new(
    store: Arc<CacheStore>,
    fetcher: CatalogFetcher,
    remote: Option<Url>,
    fallback: FallbackSource,
    events: EventChannel,
  ) -> Self {
    let revalidator = remote.clone().map(|url| {
      Revalidator::new(Arc::clone(&store), fetcher.clone(), url, events.clone())
    });

    Self {
      store,
      fetcher,
      remote,
      fallback,
      events,
      revalidator,
      pending: Mutex::new(None),
    }
  }

  /// Build a resolver backed by the on-disk cache described in `config`.
  pub fn from_config(config: &Config, events: EventChannel) -> Result<Self> {
    let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKv::open(config.cache.path.as_deref())?);
    let store = CacheStore::new(kv)
      .with_key(&config.cache.key, &config.cache.version)
      .with_ttl(config.catalog.ttl());
    let fetcher = CatalogFetcher::new(config.catalog.request_timeout())?;

    Ok(Self::new(
      Arc::new(store),
      fetcher,
      config.catalog.remote_url()?,
      FallbackSource::parse(&config.catalog.fallback),
      events,
    ))
  }

  pub fn store(&self) -> &CacheStore {
    &self.store
  }

  pub fn events(&self) -> &EventChannel {
    &self.events
  }

  /// Load the catalog. Fails only when the bundled fallback fails too.
  pub async fn load(&self, force_refresh: bool) -> Result<CatalogPayload, CatalogError> {
    self.resolve(force_refresh).await.map(|r| r.payload)
  }

  /// Load the catalog and report which tier served it.
  pub async fn resolve(&self, force_refresh: bool) -> Result<Resolved, CatalogError> {
    // Cache first
    let cached = match self.store.read() {
      CacheRead::Hit(entry) => Some(entry),
      CacheRead::Absent => None,
      CacheRead::Corrupt(reason) => {
        warn!(key = self.store.key(), "ignoring corrupt catalog cache: {}", reason);
        None
      }
    };

    if !force_refresh {
      if let Some(entry) = cached.filter(|e| self.store.is_fresh(e)) {
        debug!(source = %entry.source, "serving fresh cached catalog");
        self.events.publish(CatalogEvent::resolved(entry.source));
        self.revalidate_in_background(&entry.payload);
        return Ok(Resolved::from_cache(entry));
      }
    }

    // Remote
    if let Some(url) = &self.remote {
      match self.fetcher.fetch_url(url).await {
        Ok(payload) => return Ok(self.accept(payload, Provenance::Remote)),
        Err(e) if e.is_malformed() => {
          warn!("catalog payload format is unexpected; falling back: {}", e);
        }
        Err(e) => {
          warn!("remote catalog fetch failed; falling back: {}", e);
          self.events.publish(CatalogEvent::SourceResolved {
            source: SourceKind::RemoteFailed,
            message: Some(e.to_string()),
          });
        }
      }
    }

    // Bundled fallback
    let payload = self.fetcher.fetch_fallback(&self.fallback).await?;
    Ok(self.accept(payload, Provenance::Local))
  }

  /// Wait for the most recently started background refresh.
  pub async fn settle(&self) {
    let handle = self
      .pending
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    if let Some(handle) = handle {
      if let Err(e) = handle.await {
        debug!("background refresh task ended abnormally: {}", e);
      }
    }
  }

  fn revalidate_in_background(&self, served: &CatalogPayload) {
    let Some(revalidator) = &self.revalidator else {
      return;
    };
    if let Some(handle) = revalidator.spawn(served.clone()) {
      *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }
  }

  fn accept(&self, payload: CatalogPayload, provenance: Provenance) -> Resolved {
    if let Err(e) = self.store.write(&payload, provenance) {
      warn!("failed to cache catalog: {}", e);
    }
    info!(
      source = %provenance,
      items = payload.items.len(),
      categories = payload.categories.len(),
      version = %payload.last_updated,
      "catalog loaded"
    );
    self.events.publish(CatalogEvent::resolved(provenance));
    Resolved::fetched(payload, provenance)
  }
}
