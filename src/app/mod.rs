//! Core provisioning engine
//!
//! The catalog of known artifacts, the cached remote store, the idempotent
//! fetcher, operator-driven selection and migration, models.yaml synthesis,
//! and the orchestration tying them together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use model_fetcher::app::{
//!     CacheConfig, CacheManager, Catalog, ClientConfig, DownloadPlan, Fetcher, HubClient,
//!     HubConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Catalog::builtin()?;
//! let cache = CacheManager::new(CacheConfig::default()).await?;
//! let client = HubClient::new(&ClientConfig::default(), HubConfig::default(), cache)?;
//!
//! let plan = DownloadPlan::from_names(&catalog, ["stable-diffusion-1.5"])?;
//! let fetcher = Fetcher::new(&client, "./models/ldm/stable-diffusion-v1");
//! let report = fetcher.fetch_plan(&plan, &catalog, None).await;
//! println!("Installed: {}", report.success_set());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod client;
pub mod fetcher;
pub mod migrate;
pub mod model_config;
pub mod operator;
pub mod provision;
pub mod selection;
pub mod store;
pub mod support;

// Re-export main public API
pub use cache::{CacheConfig, CacheManager, RefRecord};
pub use catalog::{ArtifactDescriptor, Catalog, ConfigKind};
pub use client::{ClientConfig, HubClient, HubConfig};
pub use fetcher::{DownloadPlan, FetchReport, FetchResult, FetchStatus, Fetcher, SuccessSet};
pub use migrate::{migrate, MigrationOutcome};
pub use model_config::{
    persist_atomic, update_config_file, ConfigSynthesizer, ModelConfigPaths, ModelsConfig,
};
pub use operator::Operator;
pub use provision::{InstallLayout, ProvisionOptions, ProvisionSummary, Provisioner};
pub use selection::{recommended_plan, select, DefaultPolicy};
pub use store::{RemoteLocation, RemoteStore};
pub use support::{builtin_assets, install_support, SupportAsset, SupportFile, SupportResult};
