//! In-process discovery registry.
//!
//! Used by applications with a static topology and by tests. Every mutation
//! is pushed to the matching watchers synchronously.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::discovery::{Discovery, Node};
use crate::error::DiscoveryResult;

#[derive(Debug, Default)]
struct Registry {
    services: BTreeMap<String, Vec<Node>>,
    list_watchers: Vec<mpsc::UnboundedSender<Vec<String>>>,
    node_watchers: HashMap<String, Vec<mpsc::UnboundedSender<Vec<Node>>>>,
}

impl Registry {
    fn names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    fn notify_list(&mut self) {
        let names = self.names();
        self.list_watchers.retain(|tx| tx.send(names.clone()).is_ok());
    }

    fn notify_nodes(&mut self, service: &str, nodes: &[Node]) {
        if let Some(watchers) = self.node_watchers.get_mut(service) {
            watchers.retain(|tx| tx.send(nodes.to_vec()).is_ok());
        }
    }
}

/// A thread-safe, in-memory discovery backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryDiscovery {
    inner: Arc<Mutex<Registry>>,
}

impl MemoryDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // A poisoned registry still holds consistent data; keep serving it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the node list of a service, registering the service if needed.
    pub fn set_nodes(&self, service: &str, nodes: Vec<Node>) {
        let mut registry = self.lock();
        let is_new = !registry.services.contains_key(service);
        registry.services.insert(service.to_string(), nodes.clone());

        if is_new {
            tracing::debug!(service = %service, "Service registered");
            registry.notify_list();
        }
        registry.notify_nodes(service, &nodes);
    }

    /// Deregister a service. Node watchers receive an empty list.
    pub fn remove_service(&self, service: &str) {
        let mut registry = self.lock();
        if registry.services.remove(service).is_some() {
            tracing::debug!(service = %service, "Service deregistered");
            registry.notify_nodes(service, &[]);
            registry.notify_list();
        }
    }

    /// Number of live watchers, for diagnostics.
    pub fn watcher_count(&self) -> usize {
        let registry = self.lock();
        registry.list_watchers.iter().filter(|tx| !tx.is_closed()).count()
            + registry
                .node_watchers
                .values()
                .flatten()
                .filter(|tx| !tx.is_closed())
                .count()
    }
}

#[async_trait]
impl Discovery for MemoryDiscovery {
    async fn list_service_names(&self) -> DiscoveryResult<Vec<String>> {
        Ok(self.lock().names())
    }

    async fn list_service_nodes(&self, service: &str) -> DiscoveryResult<Vec<Node>> {
        Ok(self.lock().services.get(service).cloned().unwrap_or_default())
    }

    async fn watch_service_list(&self) -> DiscoveryResult<mpsc::UnboundedReceiver<Vec<String>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().list_watchers.push(tx);
        Ok(rx)
    }

    async fn watch_service_nodes(
        &self,
        service: &str,
    ) -> DiscoveryResult<mpsc::UnboundedReceiver<Vec<Node>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock()
            .node_watchers
            .entry(service.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}
