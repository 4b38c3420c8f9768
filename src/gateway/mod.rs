//! Search gateway module
//!
//! The provider's search API behind a small trait seam.
//!
//! # Features
//!
//! - **Two-phase search**: id search per window, then records page by page
//! - **Full enumeration**: one request for streams that are not windowed
//! - **Rate limiting**: token bucket limiter using governor
//! - **Failure classes**: HTTP 503 is a maintenance outage, connect errors
//!   and timeouts are connectivity failures

mod client;
mod rate_limit;
mod types;

pub use client::{GatewayConfig, HttpGateway, DEFAULT_PAGE_SIZE};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use types::{BufferedResultSet, ResultSet, SearchGateway};

#[cfg(test)]
mod tests;
