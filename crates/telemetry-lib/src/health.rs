//! Health tracking for the dashboard
//!
//! The dashboard has two moving parts: the batch source it reloads on
//! every request and the detector that classifies the batch. Each
//! classification pass updates both, and liveness/readiness are derived
//! from the latest state.

use crate::error::DetectorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, but the last pass was rejected
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

/// Tracked parts of the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    DataSource,
    Detector,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::DataSource, Component::Detector];

    pub fn name(&self) -> &'static str {
        match self {
            Component::DataSource => "data_source",
            Component::Detector => "detector",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of one component after the latest pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_checked: DateTime<Utc>,
    /// Failed passes since the last success
    pub consecutive_failures: u32,
}

impl ComponentHealth {
    fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            last_checked: Utc::now(),
            consecutive_failures: 0,
        }
    }

    fn failed(&self, status: ComponentStatus, message: String) -> Self {
        Self {
            status,
            message: Some(message),
            last_checked: Utc::now(),
            consecutive_failures: self.consecutive_failures.saturating_add(1),
        }
    }
}

/// Body of the liveness route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<Component, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across components, healthy when none is registered
    pub fn compute_status(components: &BTreeMap<Component, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|h| h.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Body of the readiness route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct RegistryState {
    components: BTreeMap<Component, ComponentHealth>,
    ready: bool,
}

/// Shared health state, cheap to clone into handlers
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a component as healthy
    pub async fn register(&self, component: Component) {
        self.state
            .write()
            .await
            .components
            .insert(component, ComponentHealth::healthy());
    }

    /// Record the outcome of a classification pass
    ///
    /// An unreadable source marks the data source unhealthy and leaves the
    /// detector untouched. A batch the detector rejects only degrades the
    /// detector.
    pub async fn record_pass(&self, outcome: Result<(), &DetectorError>) {
        let mut state = self.state.write().await;
        let components = &mut state.components;

        match outcome {
            Ok(()) => {
                for component in Component::ALL {
                    components.insert(component, ComponentHealth::healthy());
                }
            }
            Err(err @ DetectorError::SourceUnavailable(_)) => {
                let current = components
                    .remove(&Component::DataSource)
                    .unwrap_or_else(ComponentHealth::healthy);
                components.insert(
                    Component::DataSource,
                    current.failed(ComponentStatus::Unhealthy, err.to_string()),
                );
            }
            Err(err) => {
                components.insert(Component::DataSource, ComponentHealth::healthy());
                let current = components
                    .remove(&Component::Detector)
                    .unwrap_or_else(ComponentHealth::healthy);
                components.insert(
                    Component::Detector,
                    current.failed(ComponentStatus::Degraded, err.to_string()),
                );
            }
        }
    }

    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();
        HealthResponse {
            status: HealthResponse::compute_status(&components),
            components,
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;

        let reason = if !state.ready {
            Some("Dashboard not yet initialized".to_string())
        } else {
            state
                .components
                .iter()
                .find(|(_, h)| !h.status.is_operational())
                .map(|(component, h)| match &h.message {
                    Some(message) => format!("{} unavailable: {}", component, message),
                    None => format!("{} unavailable", component),
                })
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}
