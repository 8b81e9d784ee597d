//! Shared library for the provider aggregation workspace.
//!
//! This crate provides common functionality used across all crates:
//! - Configuration management
//! - Logging infrastructure
//! - Content data models returned by providers and extractors

pub mod config;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use logging::LogConfig;
pub use models::*;
