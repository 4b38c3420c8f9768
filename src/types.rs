//! Common types used throughout Solidafy Braintree
//!
//! This module contains shared type definitions, type aliases,
//! and small enums used across multiple modules.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Sync Policy
// ============================================================================

/// Strategy that decides where the extraction range starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncPolicy {
    /// Short lookback for high-churn streams, configured start date otherwise
    #[default]
    #[serde(rename = "regular")]
    Regular,
    /// Everything updated in the last three months
    #[serde(rename = "last 3 months", alias = "last-3-months", alias = "last_3_months")]
    LastThreeMonths,
    /// Everything since the configured start date
    #[serde(rename = "full")]
    Full,
}

impl SyncPolicy {
    /// Resolve the policy-derived start of the range for a stream.
    ///
    /// `regular_lookback_months` is the stream's override under `regular`;
    /// streams without one fall back to `start_date`.
    pub fn start_for(
        self,
        regular_lookback_months: Option<u32>,
        start_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match self {
            SyncPolicy::Regular => match regular_lookback_months {
                Some(months) => months_before(now, months),
                None => start_date,
            },
            SyncPolicy::LastThreeMonths => months_before(now, 3),
            SyncPolicy::Full => start_date,
        }
    }
}

fn months_before(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months)).unwrap_or(now)
}

// ============================================================================
// Abandoned Window Policy
// ============================================================================

/// What happens to a window abandoned after a connectivity failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonedWindowPolicy {
    /// Skip it for good (the remainder of the window is never fetched)
    #[default]
    Drop,
    /// Persist it in stream state and fetch it first on the next run
    Requeue,
}

// ============================================================================
// Environment
// ============================================================================

/// Provider environment, selects the default gateway URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    /// Default gateway base URL for this environment
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Production => "https://api.braintreegateway.com",
            Environment::Sandbox => "https://api.sandbox.braintreegateway.com",
        }
    }
}
