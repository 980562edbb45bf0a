//! Model Fetcher Library
//!
//! Provisioning engine for large model weight files: a catalog of known
//! artifacts, an idempotent fetcher backed by a content-addressed download
//! cache, and synthesis of the models.yaml file read by the image generation
//! application.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
