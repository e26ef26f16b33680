//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery backend (memory.rs / consul.rs)
//!     → list_service_names / list_service_nodes (initial snapshot)
//!     → watch_service_list   → orchestrator reconciliation (new pools)
//!     → watch_service_nodes  → orchestrator rebuild of one pool
//! ```
//!
//! # Design Decisions
//! - Watches are channels, not callbacks; the orchestrator owns the tasks
//!   draining them and aborts those tasks on shutdown
//! - A watch stream ends when the backend stops watching; the consumer
//!   simply stops receiving updates for that subject
//! - Backends report raw node status; health probing is not their concern

pub mod consul;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::schema::DiscoveryConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::health::state::HealthState;

pub use consul::ConsulDiscovery;
pub use memory::MemoryDiscovery;

/// Relative selection weights per reported status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weights {
    pub passing: u32,
    pub warning: u32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            passing: 1,
            warning: 1,
        }
    }
}

/// One instance of a service as reported by the discovery backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub name: Option<String>,
    pub status: HealthState,
    #[serde(default)]
    pub weights: Weights,
}

impl Node {
    pub fn new(address: impl Into<String>, port: u16, status: HealthState) -> Self {
        Self {
            address: address.into(),
            port,
            name: None,
            status,
            weights: Weights::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }
}

/// Capabilities the load balancer consumes from a service registry.
#[async_trait]
pub trait Discovery: Send + Sync + 'static {
    /// Names of every service currently known to the registry.
    async fn list_service_names(&self) -> DiscoveryResult<Vec<String>>;

    /// Current node list of one service.
    async fn list_service_nodes(&self, service: &str) -> DiscoveryResult<Vec<Node>>;

    /// Stream of full service-name lists, one item per change.
    async fn watch_service_list(&self) -> DiscoveryResult<mpsc::UnboundedReceiver<Vec<String>>>;

    /// Stream of full node lists for one service, one item per change.
    async fn watch_service_nodes(
        &self,
        service: &str,
    ) -> DiscoveryResult<mpsc::UnboundedReceiver<Vec<Node>>>;
}

/// Build the backend named by `config.backend`.
pub fn from_config(config: &DiscoveryConfig) -> DiscoveryResult<Arc<dyn Discovery>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryDiscovery::new())),
        "consul" => Ok(Arc::new(ConsulDiscovery::new(&config.consul)?)),
        other => Err(DiscoveryError::UnknownBackend(other.to_string())),
    }
}
