//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! rendezvous matchmaking service, including environment variable loading,
//! TOML file loading, and validation.

use crate::types::MatchPolicy;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matching: MatchingSettings,
    pub cleanup: CleanupSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the health/metrics endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingSettings {
    /// Active match policy (strict or random)
    pub policy: MatchPolicy,
    /// Per-user lock TTL in seconds; must exceed the worst-case critical
    /// section
    pub lock_ttl_seconds: u64,
    /// How many of the oldest queue entries a search considers
    pub candidate_sample_size: usize,
    /// Hours during which a previous partner is not matched again
    pub recent_partner_cooldown_hours: u64,
    /// Queue length above which the queue counts as overcrowded
    pub overcrowd_threshold: usize,
    /// Minimum minority-gender fraction for the queue to count as balanced
    pub min_minority_ratio: f64,
}

/// Cleanup sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupSettings {
    /// Sweep interval in seconds
    pub interval_seconds: u64,
    /// Minutes without messages after which an active pair is ended
    pub pair_inactive_minutes: u64,
    /// Maximum conversation duration in minutes
    pub pair_max_duration_minutes: u64,
    /// Minutes after which a never-matched queue entry is purged
    pub pending_stale_minutes: u64,
    /// Hours ended pairs are retained before physical deletion
    pub ended_retention_hours: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            matching: MatchingSettings::default(),
            cleanup: CleanupSettings::default(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "rendezvous".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            policy: MatchPolicy::Strict,
            lock_ttl_seconds: 30,
            candidate_sample_size: 20,
            recent_partner_cooldown_hours: 24,
            overcrowd_threshold: 50,
            min_minority_ratio: 0.2,
        }
    }
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            interval_seconds: 60,         // 1 minute
            pair_inactive_minutes: 30,    // half an hour of silence
            pair_max_duration_minutes: 720, // 12 hours
            pending_stale_minutes: 60,    // 1 hour in the queue
            ended_retention_hours: 168,   // 1 week
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            config.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Matching settings
        if let Ok(policy) = env::var("MATCH_POLICY") {
            config.matching.policy = match policy.to_lowercase().as_str() {
                "strict" => MatchPolicy::Strict,
                "random" => MatchPolicy::Random,
                _ => return Err(anyhow!("Invalid MATCH_POLICY value: {}", policy)),
            };
        }
        if let Ok(ttl) = env::var("LOCK_TTL_SECONDS") {
            config.matching.lock_ttl_seconds = ttl
                .parse()
                .map_err(|_| anyhow!("Invalid LOCK_TTL_SECONDS value: {}", ttl))?;
        }
        if let Ok(sample) = env::var("CANDIDATE_SAMPLE_SIZE") {
            config.matching.candidate_sample_size = sample
                .parse()
                .map_err(|_| anyhow!("Invalid CANDIDATE_SAMPLE_SIZE value: {}", sample))?;
        }
        if let Ok(cooldown) = env::var("RECENT_PARTNER_COOLDOWN_HOURS") {
            config.matching.recent_partner_cooldown_hours = cooldown.parse().map_err(|_| {
                anyhow!("Invalid RECENT_PARTNER_COOLDOWN_HOURS value: {}", cooldown)
            })?;
        }
        if let Ok(threshold) = env::var("QUEUE_OVERCROWD_THRESHOLD") {
            config.matching.overcrowd_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("Invalid QUEUE_OVERCROWD_THRESHOLD value: {}", threshold))?;
        }
        if let Ok(ratio) = env::var("MIN_MINORITY_RATIO") {
            config.matching.min_minority_ratio = ratio
                .parse()
                .map_err(|_| anyhow!("Invalid MIN_MINORITY_RATIO value: {}", ratio))?;
        }

        // Cleanup settings
        if let Ok(interval) = env::var("CLEANUP_INTERVAL_SECONDS") {
            config.cleanup.interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid CLEANUP_INTERVAL_SECONDS value: {}", interval))?;
        }
        if let Ok(inactive) = env::var("PAIR_INACTIVE_MINUTES") {
            config.cleanup.pair_inactive_minutes = inactive
                .parse()
                .map_err(|_| anyhow!("Invalid PAIR_INACTIVE_MINUTES value: {}", inactive))?;
        }
        if let Ok(max_duration) = env::var("PAIR_MAX_DURATION_MINUTES") {
            config.cleanup.pair_max_duration_minutes = max_duration
                .parse()
                .map_err(|_| anyhow!("Invalid PAIR_MAX_DURATION_MINUTES value: {}", max_duration))?;
        }
        if let Ok(stale) = env::var("PENDING_STALE_MINUTES") {
            config.cleanup.pending_stale_minutes = stale
                .parse()
                .map_err(|_| anyhow!("Invalid PENDING_STALE_MINUTES value: {}", stale))?;
        }
        if let Ok(retention) = env::var("ENDED_RETENTION_HOURS") {
            config.cleanup.ended_retention_hours = retention
                .parse()
                .map_err(|_| anyhow!("Invalid ENDED_RETENTION_HOURS value: {}", retention))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            anyhow!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            )
        })?;

        let config: Self = toml::from_str(&raw)
            .map_err(|e| anyhow!("Failed to parse config file: {}", e))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get per-user lock TTL as Duration
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.matching.lock_ttl_seconds)
    }

    /// Get cleanup interval as Duration
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup.interval_seconds)
    }

    /// Get the recent-partner cooldown as a chrono Duration
    pub fn recent_partner_cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(self.matching.recent_partner_cooldown_hours as i64)
    }

    /// Get the pair inactivity window as a chrono Duration
    pub fn pair_inactive(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cleanup.pair_inactive_minutes as i64)
    }

    /// Get the maximum pair duration as a chrono Duration
    pub fn pair_max_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cleanup.pair_max_duration_minutes as i64)
    }

    /// Get the pending-entry staleness threshold as a chrono Duration
    pub fn pending_stale(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cleanup.pending_stale_minutes as i64)
    }

    /// Get the ended-pair retention window as a chrono Duration
    pub fn ended_retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cleanup.ended_retention_hours as i64)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.matching.lock_ttl_seconds == 0 {
        return Err(anyhow!("Lock TTL must be greater than 0"));
    }

    // Validate matching settings
    if config.matching.candidate_sample_size == 0 {
        return Err(anyhow!("Candidate sample size must be greater than 0"));
    }
    if !(0.0..=0.5).contains(&config.matching.min_minority_ratio) {
        return Err(anyhow!(
            "Minority ratio must be between 0.0 and 0.5, got {}",
            config.matching.min_minority_ratio
        ));
    }

    // Validate cleanup settings
    if config.cleanup.interval_seconds == 0 {
        return Err(anyhow!("Cleanup interval must be greater than 0"));
    }
    if config.cleanup.pair_max_duration_minutes == 0 {
        return Err(anyhow!("Max pair duration must be greater than 0"));
    }

    Ok(())
}
