//! Content-addressed download cache
//!
//! Weight files are several gigabytes, so every download lands in a cache
//! shared across runs before it is linked into the models directory.
//!
//! # Key Features
//!
//! - **OS-specific cache directories**: Uses the standard user cache location
//! - **Content addressing**: Blobs are named by SHA-256, so identical files are
//!   stored once
//! - **Atomic operations**: Partial downloads never appear under `blobs/`
//!
//! # Module Organization
//!
//! - [`config`] - Configuration types and defaults
//! - [`path`] - Cache layout and digest helpers
//! - [`manager`] - Core cache manager with atomic operations
//!
//! # Examples
//!
//! ```rust,no_run
//! use model_fetcher::app::cache::{CacheConfig, CacheManager};
//! use model_fetcher::app::store::RemoteLocation;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = CacheManager::new(CacheConfig::default()).await?;
//! let location = RemoteLocation::hub("runwayml/stable-diffusion-v1-5", "v1-5-pruned-emaonly.ckpt");
//!
//! match cache.lookup(&location, "main").await? {
//!     Some(blob) => println!("cached at {}", blob.display()),
//!     None => println!("not cached yet"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod path;

// Re-export main public API
pub use config::CacheConfig;
pub use manager::{CacheManager, RefRecord};
pub use path::{is_sha256_hex, sha256_hex, PathGenerator};
