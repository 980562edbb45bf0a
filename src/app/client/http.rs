//! Core HTTP operations with rate limiting and retry logic
//!
//! This module provides the fundamental HTTP request operations with
//! built-in resilience patterns: a client-side rate limit and exponential
//! backoff with jitter on transport errors, 429 and 503 responses.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::auth::Credential;
use crate::constants::limits;
use crate::errors::{FetchError, StoreResult};

/// HTTP operations handler with resilience patterns
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>,
    max_retries: u32,
    idle_timeout: Duration,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidRateLimit` if `rate_limit_rps` is zero
    pub fn new(
        client: Client,
        rate_limit_rps: u32,
        max_retries: u32,
        idle_timeout: Duration,
    ) -> StoreResult<Self> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
            max_retries,
            idle_timeout,
        })
    }

    /// Longest wait for headers or the next body chunk
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Builds the rate limiter with the specified rate limit
    fn build_rate_limiter(
        rate_limit_rps: u32,
    ) -> StoreResult<RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or(FetchError::InvalidRateLimit)?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Backoff delay before retry number `attempt` (1-based)
    pub(crate) fn backoff_delay(attempt: u32) -> Duration {
        let exponential = limits::RETRY_BASE_DELAY_MS.saturating_mul(2_u64.saturating_pow(attempt));
        let capped = exponential.min(limits::MAX_BACKOFF_SECS * 1000);
        let jitter = (capped as f64 * limits::BACKOFF_JITTER_FACTOR * fastrand::f64()) as u64;
        Duration::from_millis(capped + jitter)
    }

    /// Fetches the HTTP response with rate limiting and retry logic
    ///
    /// The response is returned as soon as headers arrive so the body can be
    /// streamed. Redirects are not followed. Status codes other than 429/503
    /// are left to the caller.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the request still fails after retries
    pub async fn get_response(
        &self,
        url: &Url,
        credential: Option<&Credential>,
    ) -> StoreResult<reqwest::Response> {
        let mut retries = 0;
        loop {
            // Apply rate limiting with jitter to avoid thundering herd
            self.rate_limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
                .await;

            let mut request = self.client.get(url.as_str());
            if let Some(credential) = credential {
                request = request.bearer_auth(credential.expose());
            }

            let sent = match tokio::time::timeout(self.idle_timeout, request.send()).await {
                Ok(result) => result.map_err(FetchError::from),
                Err(_) => Err(FetchError::Stalled {
                    seconds: self.idle_timeout.as_secs(),
                }),
            };

            match sent {
                Ok(response) => {
                    let transient = match response.status() {
                        StatusCode::TOO_MANY_REQUESTS => Some(FetchError::RateLimitExceeded),
                        StatusCode::SERVICE_UNAVAILABLE => Some(FetchError::ServerOverloaded),
                        _ => None,
                    };

                    let Some(error) = transient else {
                        tracing::debug!("Received HTTP {} for {}", response.status(), url);
                        return Ok(response);
                    };

                    if retries >= self.max_retries {
                        return Err(error);
                    }
                    retries += 1;
                    let delay = Self::backoff_delay(retries);
                    tracing::warn!("{}. Backing off for {}ms", error, delay.as_millis());
                    tokio::time::sleep(delay).await;
                }
                Err(e) if retries < self.max_retries => {
                    retries += 1;
                    let delay = Self::backoff_delay(retries);
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {}ms",
                        retries,
                        self.max_retries,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        "Request to {} failed after {} retries: {}",
                        url,
                        self.max_retries,
                        e
                    );
                    return Err(FetchError::MaxRetriesExceeded {
                        max_retries: self.max_retries,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::config::ClientConfig;

    #[tokio::test]
    async fn test_rate_limiter_creation() {
        let rate_limiter = HttpHandler::build_rate_limiter(5).unwrap();
        rate_limiter.until_ready().await;
    }

    #[test]
    fn test_rate_limiter_zero_fails() {
        assert!(matches!(
            HttpHandler::build_rate_limiter(0),
            Err(FetchError::InvalidRateLimit)
        ));
    }

    #[tokio::test]
    async fn test_http_handler_creation() {
        let config = ClientConfig::default();
        let client = config.build_http_client().unwrap();
        assert!(HttpHandler::new(client, 5, 3, config.idle_timeout).is_ok());
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let first = HttpHandler::backoff_delay(1).as_millis() as u64;
        let second = HttpHandler::backoff_delay(2).as_millis() as u64;
        assert!((2000..=2200).contains(&first));
        assert!((4000..=4400).contains(&second));

        let cap = limits::MAX_BACKOFF_SECS * 1000;
        let large = HttpHandler::backoff_delay(30).as_millis() as u64;
        assert!(large >= cap);
        assert!(large <= cap + (cap as f64 * limits::BACKOFF_JITTER_FACTOR) as u64);
    }
}
