//! HTTP remote store backed by the Hugging Face hub
//!
//! [`HubClient`] implements [`RemoteStore`] over HTTPS: hub objects resolve to
//! `{endpoint}/{repo_id}/resolve/{revision}/{filename}` and carry the bearer
//! token; plain URL objects are fetched anonymously. Both go through the
//! content-addressed cache, so a second request for the same object never
//! touches the network.
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client and hub configuration
//! - `http`: Core HTTP operations with resilience patterns
//! - `download`: Streaming downloads into the cache

use std::path::PathBuf;

use async_trait::async_trait;
use url::Url;

use crate::app::cache::CacheManager;
use crate::app::store::{RemoteLocation, RemoteStore};
use crate::auth::Credential;
use crate::errors::{FetchError, StoreResult};

pub mod config;
pub mod download;
pub mod http;

pub use config::{ClientConfig, HubConfig};

use download::DownloadHandler;
use http::HttpHandler;

/// Remote store client for hub repositories and release assets
#[derive(Debug)]
pub struct HubClient {
    http_handler: HttpHandler,
    cache: CacheManager,
    hub: HubConfig,
    max_retries: u32,
    show_progress: bool,
}

impl HubClient {
    /// Creates a new HubClient
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the HTTP client cannot be built or the
    /// configuration is invalid
    pub fn new(config: &ClientConfig, hub: HubConfig, cache: CacheManager) -> StoreResult<Self> {
        Url::parse(&hub.endpoint).map_err(|e| FetchError::InvalidUrl {
            url: hub.endpoint.clone(),
            error: e.to_string(),
        })?;

        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(
            client,
            config.rate_limit_rps,
            config.max_retries,
            config.idle_timeout,
        )?;

        tracing::debug!(
            "Created hub client for {} at revision {}",
            hub.endpoint,
            hub.revision
        );

        Ok(Self {
            http_handler,
            cache,
            hub,
            max_retries: config.max_retries,
            show_progress: config.show_progress,
        })
    }

    /// The cache this client downloads into
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Build the download URL for a location
    pub fn resolve_url(&self, location: &RemoteLocation) -> StoreResult<Url> {
        let raw = match location {
            RemoteLocation::Hub { repo_id, filename } => format!(
                "{}/{}/resolve/{}/{}",
                self.hub.endpoint.trim_end_matches('/'),
                repo_id,
                self.hub.revision,
                filename
            ),
            RemoteLocation::Url(url) => url.clone(),
        };
        Url::parse(&raw).map_err(|e| FetchError::InvalidUrl {
            url: raw.clone(),
            error: e.to_string(),
        })
    }
}

#[async_trait]
impl RemoteStore for HubClient {
    async fn retrieve(
        &self,
        location: &RemoteLocation,
        credential: Option<&Credential>,
    ) -> StoreResult<PathBuf> {
        if let Some(blob) = self.cache.lookup(location, &self.hub.revision).await? {
            tracing::info!("Using cached copy of {}", location);
            return Ok(blob);
        }

        let url = self.resolve_url(location)?;
        // Never hand the hub token to third-party hosts
        let credential = credential.filter(|_| location.wants_credential());

        DownloadHandler::new(
            &self.http_handler,
            &self.cache,
            self.max_retries,
            self.show_progress,
        )
        .download_to_cache(&url, location, &self.hub.revision, credential)
        .await
    }
}
