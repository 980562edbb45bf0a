//! Application constants for Model Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Environment variable holding a Hugging Face access token
    pub const TOKEN: &str = "HF_TOKEN";
}

/// Authentication and credential-related constants
pub mod auth {
    /// Minimum plausible access token length
    pub const MIN_TOKEN_LENGTH: usize = 8;

    /// File permissions for the token file (Unix only) - owner read/write only
    #[cfg(unix)]
    pub const TOKEN_FILE_PERMISSIONS: u32 = 0o600;

    /// Token file location relative to the user's home directory
    pub const TOKEN_FILE_RELATIVE: &str = ".cache/huggingface/token";

    /// Account creation page
    pub const SIGNUP_URL: &str = "https://huggingface.co/join";

    /// Login page
    pub const LOGIN_URL: &str = "https://huggingface.co/login";

    /// Licence acceptance page for the gated weights
    pub const LICENSE_URL: &str = "https://huggingface.co/CompVis/stable-diffusion-v-1-4-original";

    /// Access token management page
    pub const TOKENS_URL: &str = "https://huggingface.co/settings/tokens";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("Model-Fetcher/", env!("CARGO_PKG_VERSION"));

    /// Longest wait for response headers or the next body chunk
    ///
    /// There is no limit on the whole transfer: weights are several GB.
    pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Maximum number of redirects to follow (hub resolves redirect to a CDN)
    pub const MAX_REDIRECTS: usize = 10;

    /// Header carrying the SHA-256 of LFS objects on the hub
    pub const LINKED_ETAG_HEADER: &str = "x-linked-etag";
}

/// Rate limiting and retry configuration
pub mod limits {
    /// Default rate limit for hub requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 5;

    /// Maximum retry attempts for failed requests
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;

    /// Maximum backoff delay (seconds)
    pub const MAX_BACKOFF_SECS: u64 = 60;

    /// Jitter factor for randomizing delays (0.0-1.0)
    pub const BACKOFF_JITTER_FACTOR: f64 = 0.1;
}

/// Remote store endpoints
pub mod hub {
    /// Hugging Face hub base URL
    pub const ENDPOINT: &str = "https://huggingface.co";

    /// Revision resolved when none is configured
    pub const DEFAULT_REVISION: &str = "main";
}

/// Local file layout
pub mod paths {
    /// Directory holding model weight files
    pub const MODELS_DIR: &str = "./models/ldm/stable-diffusion-v1";

    /// Persisted model configuration consumed by the application
    pub const MODEL_CONFIG_FILE: &str = "./configs/models.yaml";

    /// Directory holding the inference configs referenced by stanzas
    pub const INFERENCE_CONFIGS_DIR: &str = "./configs/stable-diffusion";

    /// Root that support model destinations are relative to
    pub const INSTALL_ROOT: &str = ".";

    /// Settings file name searched in the working directory
    pub const LOCAL_SETTINGS_FILE: &str = "./model-fetcher.toml";

    /// Application directory name under the user config/cache dirs
    pub const APP_DIR_NAME: &str = "model-fetcher";
}

/// Legacy install detection
pub mod legacy {
    /// Filename used by early installs for the v1.4 weights
    pub const WEIGHTS_FILENAME: &str = "model.ckpt";

    /// Catalog entry whose filename replaces the legacy name
    pub const CANONICAL_ARTIFACT: &str = "stable-diffusion-1.4";
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Partial download suffix inside the cache
    pub const PARTIAL_FILE_SUFFIX: &str = ".part";

    /// Cache subdirectory for content-addressed blobs
    pub const BLOBS_DIR: &str = "blobs";

    /// Cache subdirectory for location -> blob records
    pub const REFS_DIR: &str = "refs";

    /// Cache subdirectory for in-flight downloads
    pub const INCOMPLETE_DIR: &str = "incomplete";
}

/// Persisted model configuration format
pub mod model_config {
    /// Comment block written at the top of models.yaml
    pub const PREAMBLE: &str = "# This file describes the alternative machine learning models
# available to the image generation application.
#
# To add a new model, follow the examples below. Each
# model requires a model config file, a weights file,
# and the width and height of the images it
# was trained on.
";

    /// Stanza field: human readable description
    pub const DESCRIPTION: &str = "description";
    /// Stanza field: weights file path
    pub const WEIGHTS: &str = "weights";
    /// Stanza field: inference config path
    pub const CONFIG: &str = "config";
    /// Stanza field: training width
    pub const WIDTH: &str = "width";
    /// Stanza field: training height
    pub const HEIGHT: &str = "height";
    /// Stanza field: auxiliary decoder path
    pub const VAE: &str = "vae";
    /// Stanza field: default model marker
    pub const DEFAULT: &str = "default";
}

/// Logging and debugging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";
}

// Re-export commonly used constants for convenience
pub use env::TOKEN as ENV_TOKEN;
pub use http::USER_AGENT;
pub use limits::{DEFAULT_RATE_LIMIT_RPS, MAX_RETRIES, RETRY_BASE_DELAY_MS};
