//! Error types for Model Fetcher
//!
//! This module defines the error types for every component of the provisioning
//! engine. Per-artifact errors (fetch, migration) are reported and skipped by
//! their callers; only `AppError::UserAbort` and start-up failures end a run.

use std::path::PathBuf;
use thiserror::Error;

/// Authentication-related errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// No access token available from any source
    #[error(
        "Missing Hugging Face access token. Set HF_TOKEN or run 'auth setup' to store one"
    )]
    MissingCredential,

    /// Token entered by the operator is unusable
    #[error("Invalid access token: {reason}")]
    InvalidToken { reason: String },

    /// File I/O error during token storage
    #[error("Failed to access stored token")]
    CredentialStorage(#[from] std::io::Error),

    /// Token file location could not be determined
    #[error("Could not determine token file location: {reason}")]
    TokenPathUnavailable { reason: String },
}

/// Remote store and artifact placement errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// The requested object does not exist in the remote store
    #[error("Remote object not found: {location}")]
    RemoteNotFound { location: String },

    /// The remote store rejected the credential
    #[error("Not authorized to fetch {location} (HTTP {status}). Check your access token and licence acceptance")]
    AuthFailure { location: String, status: u16 },

    /// HTTP request error
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Local file system error (directory creation, link, rename)
    #[error("File I/O error")]
    Io(#[from] std::io::Error),

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Server returned error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimitExceeded,

    /// Server overloaded
    #[error("Server overloaded. Server responded with HTTP 503")]
    ServerOverloaded,

    /// Downloaded content does not match the digest advertised by the server
    #[error("Content hash mismatch. Expected: {expected}, got: {actual}")]
    HashMismatch { expected: String, actual: String },

    /// The server stopped sending data
    #[error("No data received for {seconds}s")]
    Stalled { seconds: u64 },

    /// A redirect could not be followed
    #[error("Bad redirect from {url}: {reason}")]
    BadRedirect { url: String, reason: String },

    /// Maximum retries exceeded
    #[error("Maximum retry attempts ({max_retries}) exceeded")]
    MaxRetriesExceeded { max_retries: u32 },

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Cache record is unreadable
    #[error("Corrupt cache record at {path}: {reason}")]
    CorruptCacheRecord { path: PathBuf, reason: String },

    /// Rate limiter configuration is invalid
    #[error("Rate limit must be non-zero")]
    InvalidRateLimit,
}

/// Catalog construction errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Catalog document could not be parsed
    #[error("Invalid catalog document")]
    Parse(#[from] toml::de::Error),

    /// Catalog file could not be read
    #[error("Failed to read catalog file: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two entries share a name
    #[error("Duplicate catalog entry: {name}")]
    DuplicateName { name: String },

    /// Entry is missing a required value
    #[error("Invalid catalog entry '{name}': {reason}")]
    InvalidEntry { name: String, reason: String },

    /// Name not present in the catalog
    #[error("Unknown artifact: {name}")]
    UnknownArtifact { name: String },
}

/// Persisted model configuration (models.yaml) errors
#[derive(Error, Debug)]
pub enum ModelConfigError {
    /// Existing config could not be read
    #[error("Failed to read model config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Existing config is not valid YAML
    #[error("Failed to parse model config {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Config is valid YAML but not the expected shape
    #[error("Unexpected model config structure: {reason}")]
    InvalidStructure { reason: String },

    /// Serialization of the new config failed
    #[error("Failed to serialize model config")]
    Serialize(#[from] serde_yaml::Error),

    /// Writing the temporary file failed
    #[error("Failed to write temporary model config in {dir}")]
    Write {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Renaming the temporary file over the target failed
    #[error("Failed to replace model config {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Legacy file migration errors
#[derive(Error, Debug)]
pub enum MigrationError {
    /// The canonical artifact is missing from the catalog
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The operator could not be asked for consent
    #[error("Failed to read operator answer")]
    Prompt(#[from] std::io::Error),

    /// The rename itself failed
    #[error("Failed to rename {from} to {to}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Settings file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be rendered
    #[error("Failed to render configuration")]
    Render(#[from] toml::ser::Error),

    /// Configuration file already exists
    #[error("Configuration file already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// No user config directory on this platform
    #[error("Could not determine user config directory")]
    NoConfigDir,

    /// I/O error reading or writing settings
    #[error("Configuration file I/O error: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Authentication error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Model config error
    #[error(transparent)]
    ModelConfig(#[from] ModelConfigError),

    /// Migration error
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Operator asked to quit
    #[error("Aborted by operator")]
    UserAbort,

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Fetch(FetchError::RateLimitExceeded)
            | AppError::Fetch(FetchError::ServerOverloaded)
            | AppError::Fetch(FetchError::Http(_))
            | AppError::Fetch(FetchError::Stalled { .. })
            | AppError::Fetch(FetchError::MaxRetriesExceeded { .. }) => true,

            AppError::Fetch(FetchError::RemoteNotFound { .. })
            | AppError::Fetch(FetchError::AuthFailure { .. })
            | AppError::Auth(AuthError::MissingCredential)
            | AppError::ModelConfig(ModelConfigError::Parse { .. })
            | AppError::UserAbort => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "authentication",
            AppError::Fetch(_) => "fetch",
            AppError::Catalog(_) => "catalog",
            AppError::ModelConfig(_) => "model-config",
            AppError::Migration(_) => "migration",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::UserAbort => "abort",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Authentication result type alias
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Fetch result type alias
pub type StoreResult<T> = std::result::Result<T, FetchError>;

/// Catalog result type alias
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Model config result type alias
pub type ModelConfigResult<T> = std::result::Result<T, ModelConfigError>;

/// Settings result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Render an error with its full source chain on one line
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
