//! Best-effort background refresh after a fresh cache hit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use super::fetch::CatalogFetcher;
use super::types::CatalogPayload;
use crate::cache::{CacheStore, Provenance};
use crate::error::CatalogError;
use crate::events::{CatalogEvent, EventChannel};

/// Refreshes the cache from the remote endpoint without blocking the caller.
///
/// At most one refresh runs at a time; `spawn` while one is in flight is a
/// no-op.
#[derive(Clone)]
pub struct Revalidator {
  store: Arc<CacheStore>,
  fetcher: CatalogFetcher,
  remote: Url,
  events: EventChannel,
  in_flight: Arc<AtomicBool>,
}

/// Clears the in-flight flag when the task ends, including by panic.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

impl Revalidator {
  pub fn new(
    store: Arc<CacheStore>,
    fetcher: CatalogFetcher,
    remote: Url,
    events: EventChannel,
  ) -> Self {
    Self {
      store,
      fetcher,
      remote,
      events,
      in_flight: Arc::new(AtomicBool::new(false)),
    }
  }

  #[cfg(test)]
  fn is_running(&self) -> bool {
    self.in_flight.load(Ordering::Acquire)
  }

  /// Start a refresh in the background unless one is already running.
  pub fn spawn(&self, previous: CatalogPayload) -> Option<JoinHandle<()>> {
    if self
      .in_flight
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      debug!("revalidation already in flight, skipping");
      return None;
    }

    let guard = InFlight(Arc::clone(&self.in_flight));
    let this = self.clone();
    Some(tokio::spawn(async move {
      let _guard = guard;
      this.revalidate(&previous).await;
    }))
  }

  /// Fetch the remote catalog and update the cache. Never fails.
  pub async fn revalidate(&self, previous: &CatalogPayload) {
    match self.refresh(previous).await {
      Ok(true) => debug!("catalog changed upstream"),
      Ok(false) => debug!("catalog unchanged upstream"),
      Err(e) => debug!("background refresh failed: {}", e),
    }
  }

  async fn refresh(&self, previous: &CatalogPayload) -> Result<bool, CatalogError> {
    let payload = self.fetcher.fetch_url(&self.remote).await?;

    if let Err(e) = self.store.write(&payload, Provenance::Remote) {
      debug!("failed to cache refreshed catalog: {}", e);
    }
    self.events.publish(CatalogEvent::resolved(Provenance::Remote));

    let changed = previous.last_updated != payload.last_updated;
    if changed {
      self.events.publish(CatalogEvent::CatalogChanged);
    }
    Ok(changed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheRead, MemoryKv};
  use std::time::Duration;

  fn revalidator() -> Revalidator {
    let store = Arc::new(CacheStore::new(Arc::new(MemoryKv::new())));
    let fetcher = CatalogFetcher::new(Duration::from_secs(2)).unwrap();
    // Nothing listens on port 1, so every refresh fails
    let remote = Url::parse("http://127.0.0.1:1/catalog.json").unwrap();
    Revalidator::new(store, fetcher, remote, EventChannel::new())
  }

  fn previous() -> CatalogPayload {
    CatalogPayload {
      items: Vec::new(),
      categories: Vec::new(),
      last_updated: "v1".into(),
    }
  }

  #[tokio::test]
  async fn test_second_spawn_while_running_is_skipped() {
    let revalidator = revalidator();

    let first = revalidator.spawn(previous());
    assert!(first.is_some());
    assert!(revalidator.is_running());
    assert!(revalidator.spawn(previous()).is_none());

    first.unwrap().await.unwrap();
    assert!(!revalidator.is_running());
    assert!(revalidator.spawn(previous()).is_some());
  }

  #[tokio::test]
  async fn test_failed_refresh_is_swallowed() {
    let revalidator = revalidator();
    let mut sub = revalidator.events.subscribe();

    revalidator.revalidate(&previous()).await;

    assert_eq!(sub.try_next(), None);
    assert_eq!(revalidator.store.read(), CacheRead::Absent);
  }
}
