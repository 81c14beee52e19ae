use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::catalog::types::CatalogPayload;
use crate::error::CatalogError;

/// Where the bundled catalog lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackSource {
  File(PathBuf),
  Url(Url),
}

impl FallbackSource {
  /// `http(s)://` locations are fetched, anything else is a file path.
  pub fn parse(location: &str) -> Self {
    match Url::parse(location) {
      Ok(url) if matches!(url.scheme(), "http" | "https") => FallbackSource::Url(url),
      _ => FallbackSource::File(PathBuf::from(location)),
    }
  }
}

impl std::fmt::Display for FallbackSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      FallbackSource::File(path) => write!(f, "{}", path.display()),
      FallbackSource::Url(url) => write!(f, "{}", url),
    }
  }
}

/// Reads catalog documents over HTTP or from disk.
#[derive(Clone)]
pub struct CatalogFetcher {
  client: Client,
}

impl CatalogFetcher {
  pub fn new(timeout: Duration) -> Result<Self, CatalogError> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| CatalogError::Network {
        origin: "client".to_string(),
        message: e.to_string(),
      })?;
    Ok(Self { client })
  }

  /// GET a catalog document, bypassing intermediate caches.
  pub async fn fetch_url(&self, url: &Url) -> Result<CatalogPayload, CatalogError> {
    let origin = url.to_string();
    let network = |e: reqwest::Error| CatalogError::Network {
      origin: origin.clone(),
      message: e.to_string(),
    };

    let response = self
      .client
      .get(url.clone())
      .header(CACHE_CONTROL, "no-store")
      .send()
      .await
      .map_err(network)?;

    let status = response.status();
    if !status.is_success() {
      return Err(CatalogError::Status {
        origin: origin.clone(),
        status: status.as_u16(),
      });
    }

    let body = response.bytes().await.map_err(network)?;
    parse_payload(&origin, &body)
  }

  /// Load the bundled catalog.
  pub async fn fetch_fallback(
    &self,
    source: &FallbackSource,
  ) -> Result<CatalogPayload, CatalogError> {
    match source {
      FallbackSource::Url(url) => self.fetch_url(url).await,
      FallbackSource::File(path) => {
        let origin = path.display().to_string();
        let body = tokio::fs::read(path).await.map_err(|source| CatalogError::Io {
          path: origin.clone(),
          source,
        })?;
        parse_payload(&origin, &body)
      }
    }
  }
}

/// Decode and shape-check a catalog body.
///
/// A body that is not JSON is a `Decode` error; JSON of the wrong shape is
/// `Malformed`.
pub fn parse_payload(origin: &str, body: &[u8]) -> Result<CatalogPayload, CatalogError> {
  let value: Value = serde_json::from_slice(body).map_err(|e| CatalogError::Decode {
    origin: origin.to_string(),
    reason: e.to_string(),
  })?;
  CatalogPayload::from_value(value).map_err(|reason| CatalogError::Malformed {
    origin: origin.to_string(),
    reason,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fallback_source_parse() {
    assert_eq!(
      FallbackSource::parse("data/equipment.json"),
      FallbackSource::File(PathBuf::from("data/equipment.json"))
    );
    assert!(matches!(
      FallbackSource::parse("https://example.com/data/equipment.json"),
      FallbackSource::Url(_)
    ));
    // Windows drive letters parse as a URL scheme
    assert!(matches!(
      FallbackSource::parse("C:/site/equipment.json"),
      FallbackSource::File(_)
    ));
  }

  #[test]
  fn test_parse_payload_classifies_shape_errors() {
    let err = parse_payload("remote", br#"{"items":[]}"#).unwrap_err();
    assert!(err.is_malformed());

    let err = parse_payload("remote", b"<html>Sign in</html>").unwrap_err();
    assert!(matches!(err, CatalogError::Decode { .. }));
    assert!(!err.is_malformed());

    let ok = parse_payload("remote", br#"{"items":[],"categories":[],"lastUpdated":"v1"}"#);
    assert_eq!(ok.unwrap().last_updated, "v1");
  }

  #[tokio::test]
  async fn test_missing_fallback_file_is_io_error() {
    let fetcher = CatalogFetcher::new(Duration::from_secs(1)).unwrap();
    let source = FallbackSource::File(PathBuf::from("/nonexistent/catalog-sync/equipment.json"));
    let err = fetcher.fetch_fallback(&source).await.unwrap_err();
    assert!(matches!(err, CatalogError::Io { .. }));
  }
}
