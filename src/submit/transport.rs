//! HTTP transport for record submission.
//!
//! The primary mode only reads responses served from the origin the request
//! was sent to. A redirect that leaves that origin is reported as
//! `TransportError::CorsBlocked`; the opaque mode follows it but never reads
//! the body.

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::redirect::{Attempt, Policy};
use reqwest::Client;
use std::error::Error as StdError;
use std::future::Future;
use thiserror::Error;
use url::Url;

/// Body content type that keeps the POST a "simple request" (no preflight).
pub const SIMPLE_CONTENT_TYPE: &str = "text/plain;charset=utf-8";

const MAX_REDIRECTS: usize = 10;

/// How the response may be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
  /// Response must be readable by the sender
  Cors,
  /// Fire and forget; the response is never read
  Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportResponse {
  Readable { status: u16, body: Vec<u8> },
  Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
  #[error("response blocked by cross-origin policy")]
  CorsBlocked,
  #[error("{0}")]
  Network(String),
}

/// Sends a POST body to an endpoint.
pub trait Transport: Send + Sync {
  fn post(
    &self,
    url: &Url,
    body: Vec<u8>,
    mode: DeliveryMode,
  ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

#[derive(Debug, Error)]
#[error("redirect to {0} leaves the request origin")]
struct CrossOriginRedirect(Url);

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
  cors: Client,
  opaque: Client,
}

impl HttpTransport {
  pub fn new(user_agent: Option<&str>) -> Result<Self, reqwest::Error> {
    let mut cors = Client::builder().redirect(Policy::custom(same_origin_only));
    let mut opaque = Client::builder().redirect(Policy::limited(MAX_REDIRECTS));
    if let Some(ua) = user_agent {
      cors = cors.user_agent(ua);
      opaque = opaque.user_agent(ua);
    }

    Ok(Self {
      cors: cors.build()?,
      opaque: opaque.build()?,
    })
  }
}

fn same_origin_only(attempt: Attempt) -> reqwest::redirect::Action {
  let leaves_origin = attempt
    .previous()
    .first()
    .is_some_and(|first| first.origin() != attempt.url().origin());

  if leaves_origin {
    let url = attempt.url().clone();
    attempt.error(CrossOriginRedirect(url))
  } else if attempt.previous().len() > MAX_REDIRECTS {
    attempt.error("too many redirects")
  } else {
    attempt.follow()
  }
}

fn classify(err: reqwest::Error) -> TransportError {
  let mut source: Option<&(dyn StdError + 'static)> = err.source();
  while let Some(e) = source {
    if e.is::<CrossOriginRedirect>() {
      return TransportError::CorsBlocked;
    }
    source = e.source();
  }
  TransportError::Network(err.to_string())
}

impl Transport for HttpTransport {
  fn post(
    &self,
    url: &Url,
    body: Vec<u8>,
    mode: DeliveryMode,
  ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send {
    let client = match mode {
      DeliveryMode::Cors => self.cors.clone(),
      DeliveryMode::Opaque => self.opaque.clone(),
    };
    let url = url.clone();

    async move {
      let response = client
        .post(url)
        .header(CONTENT_TYPE, HeaderValue::from_static(SIMPLE_CONTENT_TYPE))
        .body(body)
        .send()
        .await
        .map_err(classify)?;

      match mode {
        DeliveryMode::Opaque => Ok(TransportResponse::Opaque),
        DeliveryMode::Cors => {
          let status = response.status().as_u16();
          let body = response.bytes().await.map_err(classify)?;
          Ok(TransportResponse::Readable {
            status,
            body: body.to_vec(),
          })
        }
      }
    }
  }
}
