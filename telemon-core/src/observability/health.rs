//! Subsystem health tracking.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Overall system health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check result.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub version: &'static str,
    pub subsystems: Vec<SubsystemHealth>,
}

/// Subsystem health status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

/// Subsystem name for the broker connection.
pub const BROKER_SUBSYSTEM: &str = "broker";

/// Subsystem name for payload ingestion.
pub const INGEST_SUBSYSTEM: &str = "ingest";

/// Health checker that tracks subsystem status.
#[derive(Clone)]
pub struct HealthChecker {
    subsystems: Arc<RwLock<Vec<SubsystemHealth>>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self { subsystems: Arc::new(RwLock::new(Vec::new())) }
    }

    /// Register a subsystem for health tracking.
    ///
    /// Registering an existing name resets it to healthy.
    pub async fn register_subsystem(&self, name: String) {
        let mut subsystems = self.subsystems.write().await;
        match subsystems.iter_mut().find(|s| s.name == name) {
            Some(existing) => {
                existing.status = HealthStatus::Healthy;
                existing.message = None;
            }
            None => subsystems.push(SubsystemHealth {
                name,
                status: HealthStatus::Healthy,
                message: None,
            }),
        }
    }

    /// Current status of a single subsystem.
    pub async fn subsystem_status(&self, name: &str) -> Option<HealthStatus> {
        let subsystems = self.subsystems.read().await;
        subsystems.iter().find(|s| s.name == name).map(|s| s.status)
    }

    /// Update subsystem health status.
    pub async fn update_subsystem(
        &self,
        name: &str,
        status: HealthStatus,
        message: Option<String>,
    ) {
        let mut subsystems = self.subsystems.write().await;
        if let Some(subsystem) = subsystems.iter_mut().find(|s| s.name == name) {
            subsystem.status = status;
            subsystem.message = message;
        }
    }

    /// Get overall health status.
    ///
    /// Returns:
    /// - Healthy: All subsystems healthy
    /// - Degraded: At least one subsystem degraded, none unhealthy
    /// - Unhealthy: At least one subsystem unhealthy
    pub async fn get_health(&self) -> HealthCheck {
        let subsystems = self.subsystems.read().await.clone();

        let status = if subsystems.iter().any(|s| s.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if subsystems.iter().any(|s| s.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthCheck { status, version: env!("CARGO_PKG_VERSION"), subsystems }
    }

    /// Readiness check - are all subsystems ready?
    pub async fn is_ready(&self) -> bool {
        let health = self.get_health().await;
        health.status == HealthStatus::Healthy
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_checker() {
        let checker = HealthChecker::new();

        // No subsystems is healthy
        assert!(checker.is_ready().await);

        // Register subsystems
        checker.register_subsystem(BROKER_SUBSYSTEM.to_string()).await;
        checker.register_subsystem(INGEST_SUBSYSTEM.to_string()).await;

        let health = checker.get_health().await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.subsystems.len(), 2);

        // Mark one as degraded
        checker
            .update_subsystem(BROKER_SUBSYSTEM, HealthStatus::Degraded, Some("connecting".to_string()))
            .await;
        let health = checker.get_health().await;
        assert_eq!(health.status, HealthStatus::Degraded);

        // Mark one as unhealthy
        checker
            .update_subsystem(INGEST_SUBSYSTEM, HealthStatus::Unhealthy, Some("down".to_string()))
            .await;
        let health = checker.get_health().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert!(!checker.is_ready().await);
        assert_eq!(
            checker.subsystem_status(INGEST_SUBSYSTEM).await,
            Some(HealthStatus::Unhealthy)
        );
    }

    #[tokio::test]
    async fn test_reregister_resets_status() {
        let checker = HealthChecker::new();
        checker.register_subsystem(BROKER_SUBSYSTEM.to_string()).await;
        checker.update_subsystem(BROKER_SUBSYSTEM, HealthStatus::Unhealthy, None).await;
        checker.register_subsystem(BROKER_SUBSYSTEM.to_string()).await;

        let health = checker.get_health().await;
        assert_eq!(health.subsystems.len(), 1);
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(checker.subsystem_status("missing").await, None);
    }
}
