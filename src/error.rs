use std::time::Duration;

use thiserror::Error;

/// Failure to obtain a catalog from one tier.
#[derive(Debug, Error)]
pub enum CatalogError {
  /// Valid JSON without the expected shape
  #[error("malformed catalog from {origin}: {reason}")]
  Malformed { origin: String, reason: String },

  /// The body is not JSON at all, e.g. an HTML error page
  #[error("undecodable response from {origin}: {reason}")]
  Decode { origin: String, reason: String },

  #[error("request to {origin} failed: {message}")]
  Network { origin: String, message: String },

  #[error("HTTP {status} from {origin}")]
  Status { origin: String, status: u16 },

  #[error("failed to read {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

impl CatalogError {
  /// The payload arrived but has the wrong shape.
  pub fn is_malformed(&self) -> bool {
    matches!(self, CatalogError::Malformed { .. })
  }
}

/// Failure to submit a record.
#[derive(Debug, Error)]
pub enum SubmitError {
  #[error("lead endpoint is not configured")]
  NotConfigured,

  #[error("failed to encode record: {0}")]
  Encode(#[from] serde_json::Error),

  #[error("no response within {}ms", .0.as_millis())]
  Timeout(Duration),

  #[error("{}", http_message(.status, .message))]
  Http {
    status: u16,
    message: Option<String>,
  },

  #[error("network error: {0}")]
  Network(String),
}

fn http_message(status: &u16, message: &Option<String>) -> String {
  match message {
    Some(m) => m.clone(),
    None => format!("HTTP {}", status),
  }
}
