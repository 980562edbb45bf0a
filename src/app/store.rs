//! Remote store abstraction
//!
//! The fetcher only needs one capability from the network: "give me a local
//! cache path holding this remote object". Everything else (HTTP, retries,
//! caching) lives behind [`RemoteStore`].

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::auth::Credential;
use crate::errors::StoreResult;

/// Address of a remote object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoteLocation {
    /// File inside a hub repository
    Hub { repo_id: String, filename: String },
    /// Plain HTTPS download
    Url(String),
}

impl RemoteLocation {
    pub fn hub(repo_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self::Hub {
            repo_id: repo_id.into(),
            filename: filename.into(),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// Whether requests for this object should carry the access token
    pub fn wants_credential(&self) -> bool {
        matches!(self, Self::Hub { .. })
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hub { repo_id, filename } => write!(f, "{}/{}", repo_id, filename),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Source of remote objects, materialized into a local cache
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Return a local path holding the object, downloading it if needed
    ///
    /// The returned path belongs to the store's cache and must not be modified
    /// by the caller.
    async fn retrieve(
        &self,
        location: &RemoteLocation,
        credential: Option<&Credential>,
    ) -> StoreResult<PathBuf>;
}
