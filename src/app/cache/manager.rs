//! Content-addressed cache manager with atomic operations
//!
//! Downloads are streamed into `incomplete/`, hashed on the way, and renamed
//! into `blobs/<sha256>` once complete. A small JSON ref record maps each
//! remote location to its blob so later runs (or other installs sharing the
//! cache) skip the network entirely.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::app::store::RemoteLocation;
use crate::constants::files;
use crate::errors::{FetchError, StoreResult};

use super::config::CacheConfig;
use super::path::{is_sha256_hex, PathGenerator};

/// Record linking a remote location to a blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefRecord {
    /// Remote location the blob was fetched from
    pub location: String,
    /// Hex SHA-256 of the blob
    pub sha256: String,
    /// Blob size in bytes
    pub size: u64,
    /// When the blob was fetched
    pub fetched_at: DateTime<Utc>,
}

/// Main cache management system
#[derive(Debug, Clone)]
pub struct CacheManager {
    cache_root: PathBuf,
}

impl CacheManager {
    /// Create a new cache manager
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if no cache root can be determined or the root
    /// cannot be created
    pub async fn new(config: CacheConfig) -> StoreResult<Self> {
        let cache_root = config.resolved_root().ok_or_else(|| {
            FetchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine a cache directory",
            ))
        })?;

        fs::create_dir_all(&cache_root).await?;
        info!(
            "Initialized cache manager with root: {}",
            cache_root.display()
        );

        Ok(Self { cache_root })
    }

    /// Get the cache root directory
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Read the ref record for a location, if any
    pub async fn read_record(
        &self,
        location: &RemoteLocation,
        revision: &str,
    ) -> StoreResult<Option<RefRecord>> {
        let path = PathGenerator::ref_path(&self.cache_root, location, revision);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: RefRecord =
            serde_json::from_str(&content).map_err(|e| FetchError::CorruptCacheRecord {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        if !is_sha256_hex(&record.sha256) {
            return Err(FetchError::CorruptCacheRecord {
                path,
                reason: format!("invalid digest '{}'", record.sha256),
            });
        }
        Ok(Some(record))
    }

    /// Find the cached blob for a location
    ///
    /// A missing blob or an unreadable record counts as a miss.
    pub async fn lookup(
        &self,
        location: &RemoteLocation,
        revision: &str,
    ) -> StoreResult<Option<PathBuf>> {
        let record = match self.read_record(location, revision).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(None),
            Err(FetchError::CorruptCacheRecord { path, reason }) => {
                warn!("Ignoring cache record {}: {}", path.display(), reason);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let blob = PathGenerator::blob_path(&self.cache_root, &record.sha256);
        if fs::try_exists(&blob).await.unwrap_or(false) {
            debug!("Cache hit for {}: {}", location, blob.display());
            Ok(Some(blob))
        } else {
            debug!("Cache record for {} points at missing blob", location);
            Ok(None)
        }
    }

    /// Reserve a fresh path for an in-flight download
    pub async fn begin_partial(&self) -> StoreResult<PathBuf> {
        let path = PathGenerator::incomplete_path(&self.cache_root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(path)
    }

    /// Remove an abandoned partial download
    pub async fn discard_partial(&self, partial: &Path) {
        if let Err(e) = fs::remove_file(partial).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove partial file {}: {}", partial.display(), e);
            }
        }
    }

    /// Move a completed download into the blob store and record it
    ///
    /// When the blob already exists (same content fetched under another
    /// location) the partial file is dropped and the existing blob reused.
    pub async fn commit(
        &self,
        partial: &Path,
        sha256: &str,
        size: u64,
        location: &RemoteLocation,
        revision: &str,
    ) -> StoreResult<PathBuf> {
        let blob = PathGenerator::blob_path(&self.cache_root, sha256);
        if let Some(parent) = blob.parent() {
            fs::create_dir_all(parent).await?;
        }

        if fs::try_exists(&blob).await.unwrap_or(false) {
            debug!("Blob {} already stored, dropping duplicate", sha256);
            self.discard_partial(partial).await;
        } else {
            fs::rename(partial, &blob)
                .await
                .map_err(|_e| FetchError::AtomicOperationFailed {
                    temp_path: partial.to_path_buf(),
                    final_path: blob.clone(),
                })?;
        }

        let record = RefRecord {
            location: location.to_string(),
            sha256: sha256.to_string(),
            size,
            fetched_at: Utc::now(),
        };
        self.write_record(location, revision, &record).await?;

        Ok(blob)
    }

    async fn write_record(
        &self,
        location: &RemoteLocation,
        revision: &str,
        record: &RefRecord,
    ) -> StoreResult<()> {
        let path = PathGenerator::ref_path(&self.cache_root, location, revision);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(record).map_err(|e| {
            FetchError::CorruptCacheRecord {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        let temp_path = path.with_extension(format!("json{}", files::TEMP_FILE_SUFFIX));
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|_e| FetchError::AtomicOperationFailed {
                temp_path,
                final_path: path,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::cache::path::sha256_hex;
    use tempfile::TempDir;

    async fn cache(temp_dir: &TempDir) -> CacheManager {
        CacheManager::new(CacheConfig::with_cache_root(temp_dir.path().join("cache")))
            .await
            .unwrap()
    }

    async fn store_bytes(
        cache: &CacheManager,
        location: &RemoteLocation,
        content: &[u8],
    ) -> PathBuf {
        let partial = cache.begin_partial().await.unwrap();
        fs::write(&partial, content).await.unwrap();
        cache
            .commit(
                &partial,
                &sha256_hex(content),
                content.len() as u64,
                location,
                "main",
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_then_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let cache = cache(&temp_dir).await;
        let location = RemoteLocation::hub("org/repo", "model.ckpt");

        assert!(cache.lookup(&location, "main").await.unwrap().is_none());

        let blob = store_bytes(&cache, &location, b"weights").await;
        assert_eq!(fs::read(&blob).await.unwrap(), b"weights");
        assert_eq!(
            cache.lookup(&location, "main").await.unwrap(),
            Some(blob.clone())
        );

        // Other revisions are distinct objects
        assert!(cache.lookup(&location, "v2").await.unwrap().is_none());

        let record = cache.read_record(&location, "main").await.unwrap().unwrap();
        assert_eq!(record.size, 7);
        assert_eq!(record.location, "org/repo/model.ckpt");
    }

    #[tokio::test]
    async fn test_identical_content_shares_blob() {
        let temp_dir = TempDir::new().unwrap();
        let cache = cache(&temp_dir).await;

        let first = store_bytes(&cache, &RemoteLocation::url("https://a/x"), b"same").await;
        let second = store_bytes(&cache, &RemoteLocation::url("https://b/y"), b"same").await;
        assert_eq!(first, second);

        let mut incomplete = fs::read_dir(cache.cache_root().join(files::INCOMPLETE_DIR))
            .await
            .unwrap();
        assert!(incomplete.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_blob_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = cache(&temp_dir).await;
        let location = RemoteLocation::hub("org/repo", "model.ckpt");

        let blob = store_bytes(&cache, &location, b"weights").await;
        fs::remove_file(&blob).await.unwrap();
        assert!(cache.lookup(&location, "main").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = cache(&temp_dir).await;
        let location = RemoteLocation::hub("org/repo", "model.ckpt");

        let path = PathGenerator::ref_path(cache.cache_root(), &location, "main");
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(&path, "not json").await.unwrap();

        assert!(matches!(
            cache.read_record(&location, "main").await,
            Err(FetchError::CorruptCacheRecord { .. })
        ));
        assert!(cache.lookup(&location, "main").await.unwrap().is_none());
    }
}
