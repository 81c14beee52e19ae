//! Integration tests for `RequestChannel` and `LeadSender` over real HTTP.
//!
//! A cross-origin block is simulated with two mock servers: the endpoint
//! answers with a redirect to the second server, which is a different
//! origin (different port).

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use catalog_sync::error::SubmitError;
use catalog_sync::submit::{
  HttpTransport, Lead, LeadContext, LeadSender, RequestChannel, SIMPLE_CONTENT_TYPE,
};

fn channel() -> RequestChannel {
  RequestChannel::new(HttpTransport::new(Some("catalog-sync-test/0.1")).expect("build transport"))
}

fn endpoint(server: &MockServer) -> Url {
  Url::parse(&format!("{}/exec?action=lead", server.uri())).expect("mock url")
}

fn lead() -> Lead {
  serde_json::from_value(json!({
    "name": "Anna",
    "phone": "+7 900 000-00-00",
    "email": "anna@example.com",
    "message": "Need a crane for two weeks",
    "service": "rent",
    "consent": true,
    "sourceForm": "hero"
  }))
  .expect("lead fixture")
}

#[tokio::test]
async fn readable_response_is_confirmed_delivery() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/exec"))
    .and(header("content-type", SIMPLE_CONTENT_TYPE))
    .and(body_partial_json(json!({ "sourceForm": "hero" })))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
    .expect(1)
    .mount(&server)
    .await;

  let result = channel()
    .send(&endpoint(&server), &lead(), Duration::from_secs(5))
    .await
    .expect("send");

  assert!(result.delivered);
  assert!(!result.opaque);
  assert_eq!(result.reply.map(|r| r.ok), Some(true));
}

#[tokio::test]
async fn cross_origin_response_is_delivered_opaque() {
  let endpoint_server = MockServer::start().await;
  let other_origin = MockServer::start().await;

  Mock::given(method("POST"))
    .and(path("/exec"))
    .respond_with(
      ResponseTemplate::new(302).insert_header("location", format!("{}/echo", other_origin.uri())),
    )
    .expect(2)
    .mount(&endpoint_server)
    .await;
  Mock::given(path("/echo"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
    .mount(&other_origin)
    .await;

  let result = channel()
    .send(&endpoint(&endpoint_server), &lead(), Duration::from_secs(5))
    .await
    .expect("send");

  assert!(result.delivered);
  assert!(result.opaque);
  assert!(result.reply.is_none());
  // Only the opaque retry follows the redirect
  assert_eq!(other_origin.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn same_origin_redirect_stays_readable() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/exec"))
    .respond_with(
      ResponseTemplate::new(302).insert_header("location", format!("{}/done", server.uri())),
    )
    .mount(&server)
    .await;
  Mock::given(path("/done"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
    .mount(&server)
    .await;

  let result = channel()
    .send(&endpoint(&server), &lead(), Duration::from_secs(5))
    .await
    .expect("send");

  assert!(!result.opaque);
  assert_eq!(result.reply.map(|r| r.ok), Some(true));
}

#[tokio::test]
async fn slow_server_times_out_without_retry() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
    .mount(&server)
    .await;

  let started = Instant::now();
  let err = channel()
    .send(&endpoint(&server), &lead(), Duration::from_millis(100))
    .await
    .expect_err("should time out");

  assert!(matches!(err, SubmitError::Timeout(_)), "got {err:?}");
  assert!(started.elapsed() < Duration::from_secs(2));
  assert!(server.received_requests().await.unwrap().len() <= 1);
}

#[tokio::test]
async fn server_error_carries_reply_message() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .respond_with(
      ResponseTemplate::new(500).set_body_json(json!({ "ok": false, "error": "Telegram API error" })),
    )
    .mount(&server)
    .await;

  let err = channel()
    .send(&endpoint(&server), &lead(), Duration::from_secs(5))
    .await
    .expect_err("should fail");

  match err {
    SubmitError::Http { status, message } => {
      assert_eq!(status, 500);
      assert_eq!(message.as_deref(), Some("Telegram API error"));
    }
    other => panic!("expected Http error, got {other:?}"),
  }
}

#[tokio::test]
async fn unreachable_endpoint_is_network_error() {
  let url = Url::parse("http://127.0.0.1:1/exec").unwrap();
  let err = channel()
    .send(&url, &lead(), Duration::from_secs(5))
    .await
    .expect_err("should fail");

  assert!(matches!(err, SubmitError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn lead_sender_attaches_meta() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/exec"))
    .and(body_partial_json(json!({
      "name": "Anna",
      "consent": true,
      "meta": { "url": "https://example.com/rent", "referrer": "https://search.example/" }
    })))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
    .expect(1)
    .mount(&server)
    .await;

  let sender = LeadSender::new(
    channel(),
    Some(endpoint(&server)),
    Duration::from_secs(5),
    LeadContext {
      page_url: "https://example.com/rent".into(),
      referrer: "https://search.example/".into(),
      user_agent: "catalog-sync-test/0.1".into(),
    },
  );

  let result = sender.submit(lead()).await.expect("submit");
  assert!(!result.opaque);

  let requests = server.received_requests().await.unwrap();
  let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
  assert!(body["meta"]["ts"].as_str().is_some_and(|ts| !ts.is_empty()));
  assert_eq!(body["meta"]["userAgent"], json!("catalog-sync-test/0.1"));
}
