//! Configuration management for the rendezvous service
//!
//! This module handles all configuration loading from environment variables
//! or a TOML file, validation, and default values for the matchmaking core.

pub mod app;

// Re-export commonly used types
pub use app::{
    validate_config, AppConfig, CleanupSettings, MatchingSettings, ServiceSettings,
};
