//! Cache configuration types and defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::paths;

/// Configuration for the download cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory for cache storage (OS-specific if None)
    pub cache_root: Option<PathBuf>,
}

impl CacheConfig {
    /// Create a new cache configuration with custom cache root
    pub fn with_cache_root(cache_root: PathBuf) -> Self {
        Self {
            cache_root: Some(cache_root),
        }
    }

    /// Resolve the cache root, falling back to the user cache directory
    ///
    /// - Linux: ~/.cache/model-fetcher
    /// - macOS: ~/Library/Caches/model-fetcher
    /// - Windows: %LOCALAPPDATA%/model-fetcher
    pub fn resolved_root(&self) -> Option<PathBuf> {
        self.cache_root
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join(paths::APP_DIR_NAME)))
    }
}
