//! Extractor configuration
//!
//! Loaded from a JSON or YAML file, or passed inline as JSON.

use crate::error::{Error, Result};
use crate::gateway::{GatewayConfig, RateLimiterConfig};
use crate::types::{AbandonedWindowPolicy, Environment, SyncPolicy};
use crate::window::{parse_datetime, parse_watermark, DEFAULT_INTERVAL_HOURS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete extractor configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Merchant account id
    pub merchant_id: String,

    /// Public API key
    pub public_key: String,

    /// Private API key
    pub private_key: String,

    /// Earliest instant ever extracted (any format [`parse_datetime`] accepts)
    pub start_date: String,

    /// Where each run's range starts
    #[serde(default)]
    pub sync_state: SyncPolicy,

    /// Maximum window width in hours
    #[serde(default = "default_interval_hours")]
    pub fetch_records_interval_hours: u32,

    /// Initial watermark (`YYYY-MM-DD`) for streams without one in state
    #[serde(default, alias = "global_stream_state")]
    pub watermark: Option<String>,

    /// Provider environment
    #[serde(default)]
    pub environment: Environment,

    /// Overrides the environment's gateway URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// What to do with windows lost to connectivity failures
    #[serde(default)]
    pub abandoned_windows: AbandonedWindowPolicy,

    /// Wait after a maintenance outage, in seconds
    #[serde(default = "default_maintenance_backoff_secs")]
    pub maintenance_backoff_secs: u64,

    /// Request rate limit
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Per-request timeout, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_interval_hours() -> u32 {
    DEFAULT_INTERVAL_HOURS
}

fn default_maintenance_backoff_secs() -> u64 {
    3600
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    60
}

impl TapConfig {
    /// Create a config with defaults for everything but the credentials
    pub fn new(
        merchant_id: impl Into<String>,
        public_key: impl Into<String>,
        private_key: impl Into<String>,
        start_date: impl Into<String>,
    ) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            public_key: public_key.into(),
            private_key: private_key.into(),
            start_date: start_date.into(),
            sync_state: SyncPolicy::default(),
            fetch_records_interval_hours: default_interval_hours(),
            watermark: None,
            environment: Environment::default(),
            base_url: None,
            abandoned_windows: AbandonedWindowPolicy::default(),
            maintenance_backoff_secs: default_maintenance_backoff_secs(),
            requests_per_second: default_requests_per_second(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from a file; `.yaml` / `.yml` are read as YAML, anything else as JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("merchant_id", &self.merchant_id),
            ("public_key", &self.public_key),
            ("private_key", &self.private_key),
            ("start_date", &self.start_date),
        ] {
            if value.trim().is_empty() {
                return Err(Error::missing_field(field));
            }
        }

        self.start_date()?;
        self.initial_watermark()?;

        if self.fetch_records_interval_hours == 0 {
            return Err(Error::invalid_value(
                "fetch_records_interval_hours",
                "must be at least 1",
            ));
        }
        if self.requests_per_second == 0 {
            return Err(Error::invalid_value("requests_per_second", "must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::invalid_value("timeout_secs", "must be at least 1"));
        }
        if let Some(ref url) = self.base_url {
            url::Url::parse(url).map_err(|e| Error::invalid_value("base_url", e.to_string()))?;
        }

        Ok(())
    }

    /// Parsed start date
    pub fn start_date(&self) -> Result<DateTime<Utc>> {
        parse_datetime(&self.start_date)
            .map_err(|e| Error::invalid_value("start_date", e.to_string()))
    }

    /// Parsed initial watermark, if configured
    pub fn initial_watermark(&self) -> Result<Option<DateTime<Utc>>> {
        self.watermark.as_deref().map(parse_watermark).transpose()
    }

    /// Gateway URL in effect
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }

    /// Wait after a maintenance outage
    pub fn maintenance_backoff(&self) -> Duration {
        Duration::from_secs(self.maintenance_backoff_secs)
    }

    /// Connection settings for the HTTP gateway
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig::new(
            self.base_url(),
            &self.merchant_id,
            &self.public_key,
            &self.private_key,
        )
        .with_timeout(Duration::from_secs(self.timeout_secs))
        .with_rate_limit(RateLimiterConfig::per_second(self.requests_per_second))
    }
}

impl std::fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapConfig")
            .field("merchant_id", &self.merchant_id)
            .field("public_key", &self.public_key)
            .field("private_key", &"***")
            .field("start_date", &self.start_date)
            .field("sync_state", &self.sync_state)
            .field("fetch_records_interval_hours", &self.fetch_records_interval_hours)
            .field("watermark", &self.watermark)
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("abandoned_windows", &self.abandoned_windows)
            .finish_non_exhaustive()
    }
}
