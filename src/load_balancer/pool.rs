//! Per-service endpoint pool.
//!
//! # Responsibilities
//! - Hold the current endpoint sequence of one service
//! - Delegate selection to the bound rule
//! - Carry health cells forward when rebuilt from a newer node list

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::discovery::Node;
use crate::error::{LbError, LbResult};
use crate::load_balancer::{
    endpoint::{Endpoint, EndpointId, EndpointStatus},
    Rule,
};

/// The endpoints of one service plus the rule choosing among them.
#[derive(Debug)]
pub struct Pool {
    service: String,
    endpoints: Vec<Arc<Endpoint>>,
    index: HashMap<EndpointId, usize>,
    rule: Box<dyn Rule>,
}

impl Pool {
    /// Create a pool from ready-made endpoints. Duplicate identities keep the first entry.
    pub fn new(service: impl Into<String>, endpoints: Vec<Arc<Endpoint>>, rule: Box<dyn Rule>) -> Self {
        let mut index = HashMap::with_capacity(endpoints.len());
        let mut unique = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if index.contains_key(endpoint.id()) {
                continue;
            }
            index.insert(endpoint.id().clone(), unique.len());
            unique.push(endpoint);
        }

        Self {
            service: service.into(),
            endpoints: unique,
            index,
            rule,
        }
    }

    /// Build from a discovery node list.
    ///
    /// Endpoints already present in `previous` reuse its health cells; new
    /// ones start from the reported status.
    pub fn from_nodes(
        service: impl Into<String>,
        nodes: &[Node],
        previous: Option<&Pool>,
        rule: Box<dyn Rule>,
    ) -> Self {
        let mut seen = HashSet::with_capacity(nodes.len());
        let endpoints = nodes
            .iter()
            .filter(|node| seen.insert(EndpointId::new(&node.address, node.port)))
            .map(|node| {
                let id = EndpointId::new(&node.address, node.port);
                let carried = previous
                    .and_then(|p| p.get_endpoint(&id))
                    .map(|e| e.health_cell());
                Arc::new(Endpoint::from_node(node, carried))
            })
            .collect();

        Self::new(service, endpoints, rule)
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Select one endpoint through the bound rule.
    pub fn choose_service(&self) -> LbResult<Arc<Endpoint>> {
        self.rule
            .choose(&self.endpoints)
            .ok_or_else(|| LbError::NoAvailableEndpoint(self.service.clone()))
    }

    pub fn get_endpoint(&self, id: &EndpointId) -> Option<&Arc<Endpoint>> {
        self.index.get(id).map(|&i| &self.endpoints[i])
    }

    pub fn snapshot(&self) -> Vec<EndpointStatus> {
        self.endpoints.iter().map(|e| e.status_view()).collect()
    }
}
