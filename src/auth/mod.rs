//! Access token management for the remote model store
//!
//! Gated weight files need a Hugging Face access token. This module finds the
//! token, walks the operator through obtaining one, and stores it securely.
//!
//! # Examples
//!
//! ```rust,no_run
//! use model_fetcher::auth::{CredentialProvider, TokenStore};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = TokenStore::from_settings(None)?;
//! if store.get()?.is_none() {
//!     println!("{}", store.status().status_message());
//! }
//! # Ok(())
//! # }
//! ```

pub mod credentials;

// Re-export main public API
pub use credentials::{
    obtain_credential, setup_credentials, validate_token, AuthStatus, Credential,
    CredentialProvider, CredentialSource, TokenStore,
};
