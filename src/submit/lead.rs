//! Lead records and the sender that attaches request metadata to them.

use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::info;
use url::Url;

use super::channel::{RequestChannel, SubmissionResult};
use super::transport::{HttpTransport, Transport};
use crate::config::LeadsConfig;
use crate::error::SubmitError;

/// A contact request collected by a form. Not validated here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub phone: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub message: String,
  #[serde(default)]
  pub service: String,
  #[serde(default)]
  pub consent: bool,
  #[serde(default)]
  pub source_form: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub meta: Option<LeadMeta>,
  /// Any other form fields, e.g. `phoneNormalized`
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Where and when a lead was sent from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadMeta {
  pub url: String,
  pub referrer: String,
  pub user_agent: String,
  /// RFC 3339 timestamp
  pub ts: String,
}

/// Static part of `LeadMeta`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadContext {
  pub page_url: String,
  pub referrer: String,
  pub user_agent: String,
}

impl LeadContext {
  pub fn meta_at(&self, at: DateTime<Utc>) -> LeadMeta {
    LeadMeta {
      url: self.page_url.clone(),
      referrer: self.referrer.clone(),
      user_agent: self.user_agent.clone(),
      ts: at.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
  }
}

fn default_user_agent() -> String {
  format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Sends leads to the configured endpoint.
pub struct LeadSender<T = HttpTransport> {
  channel: RequestChannel<T>,
  endpoint: Option<Url>,
  timeout: Duration,
  context: LeadContext,
}

impl LeadSender<HttpTransport> {
  pub fn from_config(config: &LeadsConfig) -> Result<Self> {
    let user_agent = config
      .user_agent
      .clone()
      .unwrap_or_else(default_user_agent);
    let transport = HttpTransport::new(Some(user_agent.as_str()))?;

    Ok(Self::new(
      RequestChannel::new(transport),
      config.endpoint_url()?,
      config.timeout(),
      LeadContext {
        page_url: config.page_url.clone(),
        referrer: config.referrer.clone(),
        user_agent,
      },
    ))
  }
}

impl<T: Transport> LeadSender<T> {
  pub fn new(
    channel: RequestChannel<T>,
    endpoint: Option<Url>,
    timeout: Duration,
    context: LeadContext,
  ) -> Self {
    Self {
      channel,
      endpoint,
      timeout,
      context,
    }
  }

  /// Attach fresh metadata to `lead` and send it.
  pub async fn submit(&self, mut lead: Lead) -> Result<SubmissionResult, SubmitError> {
    let Some(endpoint) = &self.endpoint else {
      return Err(SubmitError::NotConfigured);
    };

    lead.meta = Some(self.context.meta_at(Utc::now()));
    let result = self.channel.send(endpoint, &lead, self.timeout).await?;
    info!(
      source_form = %lead.source_form,
      opaque = result.opaque,
      "lead submitted"
    );
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_lead_wire_format() {
    let lead: Lead = serde_json::from_value(json!({
      "name": "Anna",
      "phone": "+7 900 000-00-00",
      "phoneNormalized": "+79000000000",
      "consent": true,
      "sourceForm": "hero"
    }))
    .unwrap();

    assert_eq!(lead.source_form, "hero");
    assert_eq!(lead.extra["phoneNormalized"], json!("+79000000000"));

    let wire = serde_json::to_value(&lead).unwrap();
    assert_eq!(wire["sourceForm"], json!("hero"));
    assert_eq!(wire["phoneNormalized"], json!("+79000000000"));
    assert!(wire.get("meta").is_none());
  }

  #[test]
  fn test_meta_uses_ts_and_camel_case() {
    let context = LeadContext {
      page_url: "https://example.com/".into(),
      referrer: String::new(),
      user_agent: "catalog-sync/test".into(),
    };
    let at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
      .unwrap()
      .with_timezone(&Utc);

    let wire = serde_json::to_value(context.meta_at(at)).unwrap();
    assert_eq!(wire["ts"], json!("2024-05-01T10:00:00.000Z"));
    assert_eq!(wire["userAgent"], json!("catalog-sync/test"));
  }

  #[tokio::test]
  async fn test_missing_endpoint_is_not_configured() {
    let sender = LeadSender::from_config(&LeadsConfig::default()).unwrap();
    let err = sender.submit(Lead::default()).await.unwrap_err();
    assert!(matches!(err, SubmitError::NotConfigured));
  }
}
