//! Main application state and service coordination
//!
//! This module contains the production AppState that coordinates the pairing
//! manager, observability endpoints, and background tasks.

use crate::config::AppConfig;
use crate::lock::InMemoryLockManager;
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::notify::{LogNotifier, Notifier};
use crate::pair::InMemoryPairStore;
use crate::pairing::PairingManager;
use crate::profile::{ProfileProvider, StaticProfileProvider};
use crate::queue::InMemoryPendingQueue;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Core pairing manager
    pairing: Arc<PairingManager>,

    /// Profile provider backing the manager
    profiles: Arc<StaticProfileProvider>,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: RwLock<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing rendezvous matchmaking service");
        info!(
            "Configuration: service={}, policy={:?}, lock_ttl={}s",
            config.service.name, config.matching.policy, config.matching.lock_ttl_seconds
        );

        let metrics_collector = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let profiles = Arc::new(StaticProfileProvider::new());
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new());

        let pairing = Arc::new(PairingManager::with_matcher_and_metrics(
            Arc::new(InMemoryLockManager::new()),
            Arc::new(InMemoryPendingQueue::new()),
            Arc::new(InMemoryPairStore::new()),
            profiles.clone(),
            notifier,
            Arc::new(crate::matching::ScoredMatcher::default()),
            metrics_collector.clone(),
            config.clone(),
        ));

        let health_server = Arc::new(HealthServer::new(
            HealthServerConfig {
                port: config.service.health_port,
                host: "0.0.0.0".to_string(),
            },
            metrics_collector.clone(),
        ));
        let metrics_service = Arc::new(MetricsService::new(metrics_collector, health_server));

        Ok(Self {
            config,
            pairing,
            profiles,
            metrics_service,
            background_tasks: RwLock::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Start background tasks and observability endpoints
    pub async fn start(&self) -> Result<(), ServiceError> {
        {
            let mut running = self.is_running.write().await;
            if *running {
                warn!("Service already running");
                return Ok(());
            }
            *running = true;
        }

        // Periodic cleanup sweep
        let cleanup_handle = self.pairing.clone().start_cleanup_task();

        // Health and metrics endpoints
        let metrics_service = self.metrics_service.clone();
        let health_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Health server stopped with error: {}", e);
            }
        });

        {
            let mut tasks = self.background_tasks.write().await;
            tasks.push(cleanup_handle);
            tasks.push(health_handle);
        }

        info!("Service components started");
        Ok(())
    }

    /// Stop the service and abort background tasks
    pub async fn stop(&self) -> Result<(), ServiceError> {
        info!("Stopping service components...");

        {
            let mut running = self.is_running.write().await;
            *running = false;
        }

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop health server cleanly: {}", e);
        }

        let mut tasks = self.background_tasks.write().await;
        for task in tasks.drain(..) {
            task.abort();
        }

        info!("Service components stopped");
        Ok(())
    }

    /// Whether the service is currently running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Core pairing manager
    pub fn pairing(&self) -> Arc<PairingManager> {
        self.pairing.clone()
    }

    /// Profile provider (the in-memory bridge used by this deployment)
    pub fn profiles(&self) -> Arc<dyn ProfileProvider> {
        self.profiles.clone()
    }

    /// Metrics service
    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_lifecycle() {
        let mut config = AppConfig::default();
        // Avoid port clashes between parallel tests
        config.service.health_port = 18231;

        let state = Arc::new(AppState::new(config).await.unwrap());
        assert!(!state.is_running().await);

        state.start().await.unwrap();
        assert!(state.is_running().await);

        state.stop().await.unwrap();
        assert!(!state.is_running().await);
    }

    #[tokio::test]
    async fn test_pairing_manager_is_wired() {
        let mut config = AppConfig::default();
        config.service.health_port = 18232;

        let state = AppState::new(config).await.unwrap();
        let stats = state.pairing().get_stats().unwrap();
        assert_eq!(stats.searches, 0);
    }
}
