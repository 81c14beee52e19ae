//! Catalog payload types as served by the remote endpoint and the bundled file.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Complete catalog snapshot.
///
/// Both `items` and `categories` are required; a document missing either
/// one does not deserialize and is never cached or served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPayload {
  pub items: Vec<EquipmentItem>,
  pub categories: Vec<Category>,
  /// Opaque version token, compared as a string
  #[serde(default, deserialize_with = "deserialize_token")]
  pub last_updated: String,
}

/// Catalog item. Only `id` is interpreted; display fields are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentItem {
  #[serde(deserialize_with = "deserialize_required_token")]
  pub id: String,
  #[serde(default)]
  pub name: String,
  #[serde(
    default,
    deserialize_with = "deserialize_optional_token",
    skip_serializing_if = "Option::is_none"
  )]
  pub category: Option<String>,
  // shortDesc, fullDesc, priceRent, priceBuy, image, specs, ...
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  #[serde(deserialize_with = "deserialize_required_token")]
  pub id: String,
  #[serde(default)]
  pub name: String,
}

impl CatalogPayload {
  /// Check the shape of a raw JSON document and convert it.
  ///
  /// Returns a human-readable reason when `items` or `categories` is missing
  /// or any entry does not decode.
  pub fn from_value(value: Value) -> Result<Self, String> {
    let Some(object) = value.as_object() else {
      return Err("payload is not a JSON object".to_string());
    };
    for field in ["items", "categories"] {
      match object.get(field) {
        Some(Value::Array(_)) => {}
        Some(_) => return Err(format!("`{}` is not an array", field)),
        None => return Err(format!("missing `{}`", field)),
      }
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
  }
}

/// Version tokens and ids arrive as strings or numbers depending on the
/// spreadsheet that produced them.
fn token_to_string(value: Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) => Some(s),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    other => Some(other.to_string()),
  }
}

fn deserialize_token<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  let v = Value::deserialize(deserializer)?;
  Ok(token_to_string(v).unwrap_or_default())
}

fn deserialize_optional_token<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let v = Value::deserialize(deserializer)?;
  Ok(token_to_string(v))
}

fn deserialize_required_token<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  let v = Value::deserialize(deserializer)?;
  token_to_string(v).ok_or_else(|| serde::de::Error::custom("id must not be null"))
}
