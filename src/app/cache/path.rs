//! Cache path generation
//!
//! Layout under the cache root:
//!
//! ```text
//! blobs/<sha256>                                     content, named by digest
//! refs/hub/<org>--<repo>/<revision>/<filename>.json  hub object -> blob
//! refs/url/<sha256(url)>.json                        url object -> blob
//! incomplete/<random>.part                           in-flight downloads
//! ```

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::app::store::RemoteLocation;
use crate::constants::files;

/// Length of a hex-encoded SHA-256 digest
const SHA256_HEX_LEN: usize = 64;

/// Path generation utility for cache files
pub struct PathGenerator;

impl PathGenerator {
    /// Blob path for a content digest
    pub fn blob_path(cache_root: &Path, sha256: &str) -> PathBuf {
        cache_root.join(files::BLOBS_DIR).join(sha256)
    }

    /// Ref record path for a remote object
    pub fn ref_path(cache_root: &Path, location: &RemoteLocation, revision: &str) -> PathBuf {
        let refs = cache_root.join(files::REFS_DIR);
        match location {
            RemoteLocation::Hub { repo_id, filename } => refs
                .join("hub")
                .join(repo_id.replace('/', "--"))
                .join(revision)
                .join(format!("{}.json", filename)),
            RemoteLocation::Url(url) => refs
                .join("url")
                .join(format!("{}.json", sha256_hex(url.as_bytes()))),
        }
    }

    /// Fresh path for an in-flight download
    pub fn incomplete_path(cache_root: &Path) -> PathBuf {
        let name: String = std::iter::repeat_with(fastrand::alphanumeric)
            .take(16)
            .collect();
        cache_root
            .join(files::INCOMPLETE_DIR)
            .join(format!("{}{}", name, files::PARTIAL_FILE_SUFFIX))
    }
}

/// Hex-encoded SHA-256 of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Whether a string is a lowercase hex SHA-256 digest
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == SHA256_HEX_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}
