//! Typed publish/subscribe channel for catalog notifications.

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

use crate::cache::Provenance;

/// Which source served the catalog, as reported to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
  Remote,
  Local,
  Cache,
  /// The remote tier failed and a fallback is about to be used
  RemoteFailed,
}

impl From<Provenance> for SourceKind {
  fn from(p: Provenance) -> Self {
    match p {
      Provenance::Remote => SourceKind::Remote,
      Provenance::Local => SourceKind::Local,
      Provenance::Cache => SourceKind::Cache,
    }
  }
}

/// Catalog events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
  /// A load finished, or the remote tier failed
  SourceResolved {
    source: SourceKind,
    message: Option<String>,
  },
  /// A background refresh found a different version than the one served
  CatalogChanged,
}

impl CatalogEvent {
  pub fn resolved(source: impl Into<SourceKind>) -> Self {
    CatalogEvent::SourceResolved {
      source: source.into(),
      message: None,
    }
  }
}

/// Identifies a subscription for `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving end of a subscription.
pub struct Subscription {
  id: SubscriptionId,
  rx: mpsc::UnboundedReceiver<CatalogEvent>,
}

impl Subscription {
  pub fn id(&self) -> SubscriptionId {
    self.id
  }

  /// Wait for the next event. Returns `None` after `unsubscribe`.
  pub async fn next(&mut self) -> Option<CatalogEvent> {
    self.rx.recv().await
  }

  /// Take an already published event without waiting.
  pub fn try_next(&mut self) -> Option<CatalogEvent> {
    self.rx.try_recv().ok()
  }
}

#[derive(Default)]
struct Registry {
  next_id: u64,
  subscribers: Vec<(SubscriptionId, mpsc::UnboundedSender<CatalogEvent>)>,
}

/// Publish/subscribe hub. Clones share the same subscribers.
///
/// Every subscriber has its own unbounded queue, so `publish` never waits
/// on a slow consumer.
#[derive(Clone, Default)]
pub struct EventChannel {
  registry: Arc<Mutex<Registry>>,
}

impl EventChannel {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn subscribe(&self) -> Subscription {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
    let id = SubscriptionId(registry.next_id);
    registry.next_id += 1;
    registry.subscribers.push((id, tx));
    Subscription { id, rx }
  }

  pub fn unsubscribe(&self, id: SubscriptionId) {
    let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
    registry.subscribers.retain(|(sub, _)| *sub != id);
  }

  /// Deliver `event` to every live subscriber.
  pub fn publish(&self, event: CatalogEvent) {
    let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
    tracing::debug!(?event, subscribers = registry.subscribers.len(), "publish");
    // Drop subscribers whose receiver is gone
    registry
      .subscribers
      .retain(|(_, tx)| tx.send(event.clone()).is_ok());
  }

  #[cfg(test)]
  fn subscriber_count(&self) -> usize {
    self
      .registry
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .subscribers
      .len()
  }
}
