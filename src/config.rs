//! Configuration management for Model Fetcher
//!
//! Settings come from a TOML file found in the standard locations, with
//! built-in defaults for anything not set. Every section converts to the
//! runtime type of the component it configures.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{CacheConfig, ClientConfig, HubConfig, InstallLayout};
use crate::constants::{hub, limits, logging, paths};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Install locations
    pub paths: PathsConfig,
    /// Remote hub settings
    pub hub: HubConfigToml,
    /// Download cache settings
    pub cache: CacheConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Install locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding model weight files
    pub models_dir: PathBuf,
    /// models.yaml consumed by the application
    pub model_config_file: PathBuf,
    /// Directory holding inference configs
    pub inference_configs_dir: PathBuf,
    /// Root that support model paths are relative to
    pub install_root: PathBuf,
    /// Catalog document replacing the built-in one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from(paths::MODELS_DIR),
            model_config_file: PathBuf::from(paths::MODEL_CONFIG_FILE),
            inference_configs_dir: PathBuf::from(paths::INFERENCE_CONFIGS_DIR),
            install_root: PathBuf::from(paths::INSTALL_ROOT),
            catalog_file: None,
        }
    }
}

/// TOML-friendly hub configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfigToml {
    /// Hub base URL
    pub endpoint: String,
    /// Revision files are resolved against
    pub revision: String,
    /// Token file (defaults to ~/.cache/huggingface/token)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl Default for HubConfigToml {
    fn default() -> Self {
        Self {
            endpoint: hub::ENDPOINT.to_string(),
            revision: hub::DEFAULT_REVISION.to_string(),
            token_file: None,
        }
    }
}

/// TOML-friendly cache configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfigToml {
    /// Cache directory path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_root: Option<PathBuf>,
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// Seconds without response data before an attempt is abandoned
    pub idle_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// TCP keep-alive in seconds (None = disabled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_keepalive_secs: Option<u64>,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Retry attempts for transient failures
    pub max_retries: u32,
    /// Show download progress bars
    pub show_progress: bool,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        let runtime = ClientConfig::default();
        Self {
            idle_timeout_secs: runtime.idle_timeout.as_secs(),
            connect_timeout_secs: runtime.connect_timeout.as_secs(),
            tcp_keepalive_secs: runtime.tcp_keepalive.map(|d| d.as_secs()),
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries: limits::MAX_RETRIES,
            show_progress: runtime.show_progress,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the first file found
    ///
    /// An explicit `config_file_override` must exist; otherwise the standard
    /// locations are searched and defaults apply when none is found.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        if let Some(path) = config_file_override {
            if !path.exists() {
                return Err(ConfigError::NotFound { path });
            }
            return Self::load_from_file(&path).await;
        }

        match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path).await,
            None => {
                debug!("No config file found in standard locations, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(paths::LOCAL_SETTINGS_FILE)];
        if let Ok(user_config) = Self::default_config_path() {
            search_paths.push(user_config);
        }

        search_paths.into_iter().find(|path| {
            let found = path.exists();
            if found {
                debug!("Found config file: {}", path.display());
            }
            found
        })
    }

    /// Get the default config file path for the current user
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(paths::APP_DIR_NAME).join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Write a commented default config file, refusing to overwrite
    pub async fn init_file(path: &Path) -> ConfigResult<()> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(path, Self::generate_default_config_content())
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Created config file {}", path.display());
        Ok(())
    }

    /// Effective settings as TOML
    pub fn render(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        let client = ClientConfigToml::default();
        format!(
            r#"# Model Fetcher Configuration
# Every setting is optional; remove a line to use the built-in default.

[paths]
# Directory the weight files are installed into
models_dir = "{models_dir}"
# Model list read by the image generation application
model_config_file = "{model_config_file}"
# Directory holding the inference configs referenced from models.yaml
inference_configs_dir = "{inference_configs_dir}"
# Support model paths are relative to this directory
install_root = "{install_root}"
# Replace the built-in catalog of weight files
# catalog_file = "/path/to/catalog.toml"

[hub]
endpoint = "{endpoint}"
revision = "{revision}"
# Where the access token is stored (default: ~/.cache/huggingface/token)
# token_file = "/path/to/token"

[cache]
# Cache directory (leave unset to use the system cache directory)
# cache_root = "/path/to/custom/cache"

[client]
idle_timeout_secs = {idle_timeout_secs}
connect_timeout_secs = {connect_timeout_secs}
tcp_keepalive_secs = 30
rate_limit_rps = {rate_limit_rps}
max_retries = {max_retries}
show_progress = true

[logging]
# error, warn, info, debug, trace
level = "{level}"
"#,
            models_dir = paths::MODELS_DIR,
            model_config_file = paths::MODEL_CONFIG_FILE,
            inference_configs_dir = paths::INFERENCE_CONFIGS_DIR,
            install_root = paths::INSTALL_ROOT,
            endpoint = hub::ENDPOINT,
            revision = hub::DEFAULT_REVISION,
            idle_timeout_secs = client.idle_timeout_secs,
            connect_timeout_secs = client.connect_timeout_secs,
            rate_limit_rps = client.rate_limit_rps,
            max_retries = client.max_retries,
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }

    /// Install locations for the provisioner
    pub fn install_layout(&self) -> InstallLayout {
        InstallLayout {
            models_dir: self.paths.models_dir.clone(),
            model_config_file: self.paths.model_config_file.clone(),
            inference_configs_dir: self.paths.inference_configs_dir.clone(),
            install_root: self.paths.install_root.clone(),
        }
    }
}

impl HubConfigToml {
    /// Convert to runtime HubConfig
    pub fn to_runtime_config(&self) -> HubConfig {
        HubConfig {
            endpoint: self.endpoint.clone(),
            revision: self.revision.clone(),
        }
    }
}

impl CacheConfigToml {
    /// Convert to runtime CacheConfig
    pub fn to_runtime_config(&self) -> CacheConfig {
        CacheConfig {
            cache_root: self.cache_root.clone(),
        }
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            tcp_keepalive: self.tcp_keepalive_secs.map(Duration::from_secs),
            rate_limit_rps: self.rate_limit_rps,
            max_retries: self.max_retries,
            show_progress: self.show_progress,
        }
    }
}
