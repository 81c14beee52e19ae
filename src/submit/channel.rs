//! Resilient delivery of a JSON record to a remote endpoint.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::transport::{DeliveryMode, HttpTransport, Transport, TransportError, TransportResponse};
use crate::error::SubmitError;

/// Optional JSON reply of the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReply {
  #[serde(default)]
  pub ok: bool,
  pub error: Option<String>,
  pub message: Option<String>,
}

/// Outcome of a submission that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
  pub delivered: bool,
  /// Sent, but the response could not be read
  pub opaque: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reply: Option<SubmitReply>,
}

impl SubmissionResult {
  fn confirmed(reply: Option<SubmitReply>) -> Self {
    Self {
      delivered: true,
      opaque: false,
      reply,
    }
  }

  fn opaque() -> Self {
    Self {
      delivered: true,
      opaque: true,
      reply: None,
    }
  }
}

/// POSTs records with a timeout and an opaque fallback for cross-origin
/// blocks.
#[derive(Clone)]
pub struct RequestChannel<T = HttpTransport> {
  transport: T,
}

impl<T: Transport> RequestChannel<T> {
  pub fn new(transport: T) -> Self {
    Self { transport }
  }

  /// Send `record` as JSON.
  ///
  /// A timeout is final: nothing is retried after it. A cross-origin block
  /// is retried once in opaque mode and reported as `opaque: true`.
  pub async fn send<R: Serialize + ?Sized>(
    &self,
    url: &Url,
    record: &R,
    timeout: Duration,
  ) -> Result<SubmissionResult, SubmitError> {
    let body = serde_json::to_vec(record)?;

    let primary = tokio::time::timeout(
      timeout,
      self.transport.post(url, body.clone(), DeliveryMode::Cors),
    )
    .await
    .map_err(|_| SubmitError::Timeout(timeout))?;

    match primary {
      Ok(TransportResponse::Readable { status, body }) => interpret(status, &body),
      Ok(TransportResponse::Opaque) => Ok(SubmissionResult::opaque()),
      Err(TransportError::CorsBlocked) => {
        warn!(%url, "response blocked by cross-origin policy; resending without reading it");
        self.send_opaque(url, body, timeout).await
      }
      Err(TransportError::Network(message)) => Err(SubmitError::Network(message)),
    }
  }

  async fn send_opaque(
    &self,
    url: &Url,
    body: Vec<u8>,
    timeout: Duration,
  ) -> Result<SubmissionResult, SubmitError> {
    tokio::time::timeout(timeout, self.transport.post(url, body, DeliveryMode::Opaque))
      .await
      .map_err(|_| SubmitError::Timeout(timeout))?
      .map_err(|e| SubmitError::Network(e.to_string()))?;
    Ok(SubmissionResult::opaque())
  }
}

fn interpret(status: u16, body: &[u8]) -> Result<SubmissionResult, SubmitError> {
  let reply: Option<SubmitReply> = match serde_json::from_slice(body) {
    Ok(reply) => Some(reply),
    Err(e) => {
      debug!("response body is not a JSON reply: {}", e);
      None
    }
  };

  if !(200..300).contains(&status) {
    let message = reply.and_then(|r| r.error.or(r.message));
    return Err(SubmitError::Http { status, message });
  }

  Ok(SubmissionResult::confirmed(reply))
}
