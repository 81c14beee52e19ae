use chrono::Duration as ChronoDuration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::cache::{DEFAULT_KEY, DEFAULT_VERSION};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub catalog: CatalogConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub leads: LeadsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
  /// Remote catalog endpoint. Without it only the bundled file is used.
  pub remote_url: Option<String>,
  /// Bundled catalog: a file path or an http(s) URL
  #[serde(default = "default_fallback")]
  pub fallback: String,
  /// Seconds before a cached catalog is considered stale
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: u64,
  #[serde(default = "default_catalog_timeout_ms")]
  pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_cache_key")]
  pub key: String,
  /// Bump when the stored payload shape changes incompatibly
  #[serde(default = "default_cache_version")]
  pub version: String,
  /// SQLite file (default: $XDG_DATA_HOME/catalog-sync/cache.db)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeadsConfig {
  pub endpoint: Option<String>,
  #[serde(default = "default_lead_timeout_ms")]
  pub timeout_ms: u64,
  /// Reported as `meta.url`
  #[serde(default)]
  pub page_url: String,
  #[serde(default)]
  pub referrer: String,
  pub user_agent: Option<String>,
}

fn default_fallback() -> String {
  "data/equipment.json".to_string()
}

fn default_ttl_secs() -> u64 {
  60 * 60
}

fn default_catalog_timeout_ms() -> u64 {
  15_000
}

fn default_cache_key() -> String {
  DEFAULT_KEY.to_string()
}

fn default_cache_version() -> String {
  DEFAULT_VERSION.to_string()
}

fn default_lead_timeout_ms() -> u64 {
  15_000
}

impl Default for CatalogConfig {
  fn default() -> Self {
    Self {
      remote_url: None,
      fallback: default_fallback(),
      ttl_secs: default_ttl_secs(),
      timeout_ms: default_catalog_timeout_ms(),
    }
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      key: default_cache_key(),
      version: default_cache_version(),
      path: None,
    }
  }
}

impl Default for LeadsConfig {
  fn default() -> Self {
    Self {
      endpoint: None,
      timeout_ms: default_lead_timeout_ms(),
      page_url: String::new(),
      referrer: String::new(),
      user_agent: None,
    }
  }
}

impl CatalogConfig {
  pub fn ttl(&self) -> ChronoDuration {
    let secs = i64::try_from(self.ttl_secs)
      .unwrap_or(i64::MAX)
      .min(i64::MAX / 1000);
    ChronoDuration::seconds(secs)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }

  /// The remote endpoint, if one is configured. Blank means none.
  pub fn remote_url(&self) -> Result<Option<Url>> {
    parse_optional_url("catalog.remote_url", self.remote_url.as_deref())
  }
}

impl LeadsConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }

  pub fn endpoint_url(&self) -> Result<Option<Url>> {
    parse_optional_url("leads.endpoint", self.endpoint.as_deref())
  }
}

fn parse_optional_url(field: &str, value: Option<&str>) -> Result<Option<Url>> {
  match value.map(str::trim) {
    None | Some("") => Ok(None),
    Some(raw) => Url::parse(raw)
      .map(Some)
      .map_err(|e| eyre!("Invalid URL in {}: {}: {}", field, raw, e)),
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./catalog-sync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/catalog-sync/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found; see config.example.yaml and place it at \
         ./catalog-sync.yaml or ~/.config/catalog-sync/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("catalog-sync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("catalog-sync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("{}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Invalid config: {}", e))?;
    // Surface bad URLs at startup rather than on first use
    config.catalog.remote_url()?;
    config.leads.endpoint_url()?;
    Ok(config)
  }

  /// Log filter from the environment.
  ///
  /// Checks CATALOG_SYNC_LOG first, then RUST_LOG, then defaults to `info`.
  pub fn log_filter() -> String {
    std::env::var("CATALOG_SYNC_LOG")
      .or_else(|_| std::env::var("RUST_LOG"))
      .unwrap_or_else(|_| "info".to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::parse("{}").unwrap();
    assert_eq!(config.catalog.ttl(), ChronoDuration::hours(1));
    assert_eq!(config.catalog.fallback, "data/equipment.json");
    assert_eq!(config.cache.key, "catalog");
    assert_eq!(config.cache.version, "v1");
    assert_eq!(config.leads.timeout(), Duration::from_secs(15));
    assert!(config.catalog.remote_url().unwrap().is_none());
  }

  #[test]
  fn test_full_config() {
    let config = Config::parse(
      r#"
catalog:
  remote_url: https://script.example.com/exec?action=catalog
  fallback: site/data/equipment.json
  ttl_secs: 600
cache:
  version: v3
leads:
  endpoint: https://script.example.com/exec?action=lead
  timeout_ms: 5000
  page_url: https://example.com/rent
"#,
    )
    .unwrap();

    assert_eq!(
      config.catalog.remote_url().unwrap().unwrap().query(),
      Some("action=catalog")
    );
    assert_eq!(config.catalog.ttl(), ChronoDuration::minutes(10));
    assert_eq!(config.cache.version, "v3");
    assert_eq!(config.leads.timeout(), Duration::from_secs(5));
    assert_eq!(config.leads.page_url, "https://example.com/rent");
  }

  #[test]
  fn test_blank_remote_is_none() {
    let config = Config::parse("catalog:\n  remote_url: \"  \"\n").unwrap();
    assert!(config.catalog.remote_url().unwrap().is_none());
  }

  #[test]
  fn test_invalid_url_is_rejected() {
    assert!(Config::parse("leads:\n  endpoint: not a url\n").is_err());
  }

  #[test]
  fn test_bad_file_error_names_path() {
    let path = std::env::temp_dir().join(format!("catalog-sync-config-{}.yaml", std::process::id()));
    std::fs::write(&path, "catalog: [not, a, map]\n").unwrap();

    let err = Config::load(Some(path.as_path())).unwrap_err().to_string();
    let _ = std::fs::remove_file(&path);

    assert!(err.contains(&path.display().to_string()), "error: {err}");
    assert!(err.contains("Invalid config"), "error: {err}");
  }

  #[test]
  fn test_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/catalog-sync.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
