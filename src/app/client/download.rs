//! Streaming downloads into the content-addressed cache
//!
//! Bodies are streamed chunk by chunk into a cache partial file while the
//! SHA-256 is computed, so multi-gigabyte weights never sit in memory. The
//! digest is checked against the one advertised by the server (when there is
//! one) before the blob is committed.
//!
//! Redirects are followed here rather than by `reqwest`: the hub advertises
//! the digest on its `302` to the CDN, not on the final response.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, ETAG, LOCATION};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::app::cache::{is_sha256_hex, CacheManager};
use crate::app::client::http::HttpHandler;
use crate::app::store::RemoteLocation;
use crate::auth::Credential;
use crate::constants::http;
use crate::errors::{FetchError, StoreResult};

/// File download operations handler
pub struct DownloadHandler<'a> {
    http_handler: &'a HttpHandler,
    cache: &'a CacheManager,
    max_retries: u32,
    show_progress: bool,
}

/// Outcome of streaming one response body
struct Transfer {
    sha256: String,
    size: u64,
}

impl<'a> DownloadHandler<'a> {
    /// Creates a new DownloadHandler over the given HTTP handler and cache
    pub fn new(
        http_handler: &'a HttpHandler,
        cache: &'a CacheManager,
        max_retries: u32,
        show_progress: bool,
    ) -> Self {
        Self {
            http_handler,
            cache,
            max_retries,
            show_progress,
        }
    }

    /// Downloads `url` into the cache and records it under `location`
    ///
    /// Interrupted transfers are retried from scratch; authorization, missing
    /// objects and digest mismatches are not retried.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the object cannot be fetched or verified
    pub async fn download_to_cache(
        &self,
        url: &Url,
        location: &RemoteLocation,
        revision: &str,
        credential: Option<&Credential>,
    ) -> StoreResult<PathBuf> {
        let mut retries = 0;
        loop {
            match self.download_attempt(url, location, revision, credential).await {
                Ok(blob) => {
                    tracing::info!("Cached {} as {}", location, blob.display());
                    return Ok(blob);
                }
                Err(e) if is_transient(&e) && retries < self.max_retries => {
                    retries += 1;
                    let delay = HttpHandler::backoff_delay(retries);
                    tracing::warn!(
                        "Download of {} failed (attempt {}/{}): {}. Retrying in {}ms",
                        location,
                        retries,
                        self.max_retries,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn download_attempt(
        &self,
        url: &Url,
        location: &RemoteLocation,
        revision: &str,
        credential: Option<&Credential>,
    ) -> StoreResult<PathBuf> {
        let (response, expected) = self.follow_redirects(url, credential).await?;
        check_status(response.status(), location)?;

        let partial = self.cache.begin_partial().await?;

        let transfer = match self.stream_to_file(response, &partial, location).await {
            Ok(transfer) => transfer,
            Err(e) => {
                self.cache.discard_partial(&partial).await;
                return Err(e);
            }
        };

        if let Some(expected) = expected {
            if expected != transfer.sha256 {
                self.cache.discard_partial(&partial).await;
                return Err(FetchError::HashMismatch {
                    expected,
                    actual: transfer.sha256,
                });
            }
        }

        self.cache
            .commit(&partial, &transfer.sha256, transfer.size, location, revision)
            .await
    }

    /// Request `url`, following redirects up to the final response
    ///
    /// Returns that response with the first SHA-256 advertised along the way.
    /// The credential only goes to the origin of `url`.
    async fn follow_redirects(
        &self,
        url: &Url,
        credential: Option<&Credential>,
    ) -> StoreResult<(reqwest::Response, Option<String>)> {
        let mut current = url.clone();
        let mut advertised = None;

        for _ in 0..=http::MAX_REDIRECTS {
            let credential = credential.filter(|_| current.origin() == url.origin());
            let response = self.http_handler.get_response(&current, credential).await?;

            if advertised.is_none() {
                advertised = advertised_sha256(response.headers());
            }
            if !response.status().is_redirection() {
                return Ok((response, advertised));
            }

            current = redirect_target(&current, response.headers())?;
            tracing::debug!("Following redirect to {}", current);
        }

        Err(FetchError::BadRedirect {
            url: url.to_string(),
            reason: format!("more than {} redirects", http::MAX_REDIRECTS),
        })
    }

    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        partial: &Path,
        location: &RemoteLocation,
    ) -> StoreResult<Transfer> {
        let bar = self.progress_bar(response.content_length(), location);
        let mut file = File::create(partial).await?;
        let mut hasher = Sha256::new();
        let mut size = 0_u64;

        let idle = self.http_handler.idle_timeout();
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::time::timeout(idle, stream.next())
                .await
                .map_err(|_| FetchError::Stalled {
                    seconds: idle.as_secs(),
                })?;
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
            bar.set_position(size);
        }

        file.flush().await?;
        file.sync_all().await?;
        bar.finish_and_clear();

        Ok(Transfer {
            sha256: format!("{:x}", hasher.finalize()),
            size,
        })
    }

    fn progress_bar(&self, total: Option<u64>, location: &RemoteLocation) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let bar = match total {
            Some(total) => ProgressBar::new(total),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        ) {
            bar.set_style(style.progress_chars("##-"));
        }
        bar.set_message(display_name(location));
        bar
    }
}

/// Map a response status onto the remote store error taxonomy
pub(crate) fn check_status(status: StatusCode, location: &RemoteLocation) -> StoreResult<()> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::AuthFailure {
            location: location.to_string(),
            status: status.as_u16(),
        }),
        StatusCode::NOT_FOUND => Err(FetchError::RemoteNotFound {
            location: location.to_string(),
        }),
        other => Err(FetchError::ServerError {
            status: other.as_u16(),
        }),
    }
}

/// Absolute URL of a redirect's `Location`, relative to `current`
fn redirect_target(current: &Url, headers: &HeaderMap) -> StoreResult<Url> {
    let bad = |reason: String| FetchError::BadRedirect {
        url: current.to_string(),
        reason,
    };
    let value = headers
        .get(LOCATION)
        .ok_or_else(|| bad("no Location header".to_string()))?
        .to_str()
        .map_err(|e| bad(e.to_string()))?;
    current.join(value).map_err(|e| bad(e.to_string()))
}

/// SHA-256 advertised by the server for the body, if any
///
/// The hub sends `X-Linked-Etag` for large files; some CDNs reuse the digest
/// as the plain `ETag`. Anything that is not a SHA-256 is ignored.
pub(crate) fn advertised_sha256(headers: &HeaderMap) -> Option<String> {
    [headers.get(http::LINKED_ETAG_HEADER), headers.get(ETAG)]
        .into_iter()
        .flatten()
        .filter_map(|value| value.to_str().ok())
        .map(|value| {
            value
                .trim()
                .trim_start_matches("W/")
                .trim_matches('"')
                .to_ascii_lowercase()
        })
        .find(|value| is_sha256_hex(value))
}

fn is_transient(error: &FetchError) -> bool {
    matches!(
        error,
        FetchError::Http(_) | FetchError::ServerError { .. } | FetchError::Stalled { .. }
    )
}

fn display_name(location: &RemoteLocation) -> String {
    let full = location.to_string();
    full.rsplit('/').next().unwrap_or(&full).to_string()
}
