//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent one network-addressable instance of a service
//! - Derive identity from address and port only
//! - Hold a handle to the shared health cell for that identity

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::discovery::{Node, Weights};
use crate::health::state::{HealthCell, HealthState};

/// Content-addressed endpoint identity: `address:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(address: &str, port: u16) -> Self {
        Self(format!("{}:{}", address, port))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single remote instance.
///
/// Identity and metadata are fixed at construction; only the health cell
/// behind it changes.
#[derive(Debug)]
pub struct Endpoint {
    id: EndpointId,
    address: String,
    port: u16,
    name: Option<String>,
    weights: Weights,
    health: Arc<HealthCell>,
}

impl Endpoint {
    /// Create an endpoint with a fresh health cell.
    pub fn new(address: impl Into<String>, port: u16, status: HealthState) -> Self {
        let address = address.into();
        Self {
            id: EndpointId::new(&address, port),
            address,
            port,
            name: None,
            weights: Weights::default(),
            health: Arc::new(HealthCell::new(status)),
        }
    }

    /// Build from a discovery node.
    ///
    /// When `carried` is given the endpoint shares that cell instead of
    /// allocating a new one. Either way the reported status is stored.
    pub fn from_node(node: &Node, carried: Option<Arc<HealthCell>>) -> Self {
        let health = match carried {
            Some(cell) => {
                cell.set(node.status);
                cell
            }
            None => Arc::new(HealthCell::new(node.status)),
        };

        Self {
            id: EndpointId::new(&node.address, node.port),
            address: node.address.clone(),
            port: node.port,
            name: node.name.clone(),
            weights: node.weights,
            health,
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

    pub fn id(&self) -> &EndpointId {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn weights(&self) -> Weights {
        self.weights
    }

    pub fn status(&self) -> HealthState {
        self.health.get()
    }

    pub fn set_status(&self, status: HealthState) -> HealthState {
        self.health.set(status)
    }

    pub fn health_cell(&self) -> Arc<HealthCell> {
        self.health.clone()
    }

    /// `host:port` suitable for URLs; IPv6 literals are bracketed.
    pub fn authority(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }

    pub fn status_view(&self) -> EndpointStatus {
        EndpointStatus {
            id: self.id.clone(),
            address: self.address.clone(),
            port: self.port,
            name: self.name.clone(),
            status: self.status(),
        }
    }
}

/// Point-in-time view of an endpoint, for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointStatus {
    pub id: EndpointId,
    pub address: String,
    pub port: u16,
    pub name: Option<String>,
    pub status: HealthState,
}
