//! HTTP client configuration and building logic
//!
//! This module handles the configuration and construction of the HTTP client
//! used for hub and release-asset downloads.

use std::time::Duration;

use reqwest::{redirect, Client};
use serde::{Deserialize, Serialize};

use crate::constants::{http, hub, limits};
use crate::errors::StoreResult;

/// Remote hub endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Base URL of the hub
    pub endpoint: String,
    /// Branch, tag or commit to resolve files against
    pub revision: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: hub::ENDPOINT.to_string(),
            revision: hub::DEFAULT_REVISION.to_string(),
        }
    }
}

/// Configuration for the HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Longest wait for headers or the next body chunk
    pub idle_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// TCP keep-alive settings
    pub tcp_keepalive: Option<Duration>,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Retry attempts for transient failures
    pub max_retries: u32,
    /// Show download progress bars
    pub show_progress: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            idle_timeout: http::IDLE_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            tcp_keepalive: Some(Duration::from_secs(30)),
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries: limits::MAX_RETRIES,
            show_progress: true,
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client with the specified configuration
    ///
    /// No total timeout is set, so a slow multi-GB transfer is never cut
    /// off; stalls are caught by `idle_timeout` around each read. Redirects
    /// are followed by the download handler, which needs the headers of the
    /// hub's own response.
    pub fn build_http_client(&self) -> StoreResult<Client> {
        let mut client_builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(http::USER_AGENT)
            .redirect(redirect::Policy::none());

        if let Some(keepalive) = self.tcp_keepalive {
            client_builder = client_builder.tcp_keepalive(keepalive);
        }

        Ok(client_builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.max_retries, limits::MAX_RETRIES);
        assert!(config.show_progress);
    }

    #[test]
    fn test_http_client_with_custom_config() {
        let config = ClientConfig {
            idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            tcp_keepalive: None,
            ..Default::default()
        };

        assert!(config.build_http_client().is_ok());
    }
}
