//! Configuration for the climate chat pipeline
//!
//! Supports loading configuration from:
//! - TOML files
//! - Environment variables (CLIMATE_CHAT_ prefix)
//!
//! Domain-agnostic defaults (timeouts, retrieval tuning, thresholds) live in
//! [`constants`]; the supported-language tables live in [`languages`].

pub mod constants;
pub mod languages;
pub mod settings;

pub use settings::{
    load_settings, CacheSettings, GuardSettings, PipelineSettings, ProviderSettings,
    RetrievalSettings, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration error: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
