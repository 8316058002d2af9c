//! Shared HTTP client factory.
//!
//! Provides consistent HTTP client configuration for upstream calls.

use reqwest::Client;
use std::time::Duration;

/// Create a new HTTP client with a custom timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("allergen-relay/", env!("CARGO_PKG_VERSION")))
        .build()
}
