//! Consul discovery backend.
//!
//! # Responsibilities
//! - List services via `/v1/catalog/services`
//! - List nodes via `/v1/health/service/<name>` and fold check results into a status
//! - Watch both endpoints with Consul blocking queries (`X-Consul-Index`)

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;
use url::Url;

use crate::config::schema::ConsulConfig;
use crate::discovery::{Discovery, Node, Weights};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::health::state::HealthState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    node: CatalogNode,
    service: AgentService,
    #[serde(default)]
    checks: Vec<HealthCheck>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CatalogNode {
    #[serde(default)]
    node: String,
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AgentService {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(default)]
    address: String,
    port: u16,
    #[serde(default)]
    weights: Option<ConsulWeights>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulWeights {
    passing: u32,
    warning: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthCheck {
    status: String,
}

/// Fold Consul check statuses into one state: any critical wins, then warning.
fn aggregate_status<'a>(statuses: impl IntoIterator<Item = &'a str>) -> HealthState {
    let mut state = HealthState::Passing;
    for status in statuses {
        match status {
            "passing" => {}
            "warning" => state = HealthState::Warning,
            // critical, maintenance and anything unrecognized
            _ => return HealthState::Critical,
        }
    }
    state
}

fn to_node(entry: HealthEntry) -> Node {
    let address = if entry.service.address.is_empty() {
        entry.node.address
    } else {
        entry.service.address
    };
    let status = aggregate_status(entry.checks.iter().map(|c| c.status.as_str()));
    let name = if entry.service.id.is_empty() {
        entry.node.node
    } else {
        entry.service.id
    };

    let mut node = Node::new(address, entry.service.port, status);
    if !name.is_empty() {
        node = node.with_name(name);
    }
    if let Some(w) = entry.service.weights {
        node = node.with_weights(Weights {
            passing: w.passing,
            warning: w.warning,
        });
    }
    node
}

fn to_nodes(entries: Vec<HealthEntry>) -> Vec<Node> {
    entries.into_iter().map(to_node).collect()
}

fn to_names(services: HashMap<String, Vec<String>>) -> Vec<String> {
    let mut names: Vec<String> = services.into_keys().collect();
    names.sort();
    names
}

/// Discovery backend talking to a Consul agent over HTTP.
#[derive(Debug, Clone)]
pub struct ConsulDiscovery {
    client: reqwest::Client,
    base_url: Url,
    wait: Duration,
    retry: Duration,
}

impl ConsulDiscovery {
    pub fn new(config: &ConsulConfig) -> DiscoveryResult<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| DiscoveryError::InvalidUrl(format!("{}: {}", config.url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DiscoveryError::InvalidUrl(config.url.clone()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            wait: Duration::from_secs(config.wait_secs),
            retry: Duration::from_secs(config.retry_secs.max(1)),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> DiscoveryResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DiscoveryError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Run one (optionally blocking) query, returning the body and the new index.
    async fn fetch<T: DeserializeOwned>(
        &self,
        url: Url,
        index: Option<u64>,
    ) -> DiscoveryResult<(T, Option<u64>)> {
        let mut request = self.client.get(url);
        if let Some(index) = index {
            request = request.query(&[
                ("index", index.to_string()),
                ("wait", format!("{}s", self.wait.as_secs())),
            ]);
        }

        let response = request.send().await?.error_for_status()?;
        let new_index = response
            .headers()
            .get("X-Consul-Index")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = decode(&response.bytes().await?)?;
        Ok((body, new_index))
    }

    fn spawn_watch<R, T>(&self, url: Url, map: fn(R) -> T) -> mpsc::UnboundedReceiver<T>
    where
        R: DeserializeOwned + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let this = self.clone();

        tokio::spawn(async move {
            let mut index: Option<u64> = None;
            loop {
                let result = tokio::select! {
                    _ = tx.closed() => break,
                    result = this.fetch::<R>(url.clone(), index) => result,
                };

                let pause = match result {
                    Ok((body, new_index)) => {
                        if (new_index.is_none() || new_index != index) && tx.send(map(body)).is_err() {
                            break;
                        }
                        index = match (index, new_index) {
                            // Index moving backwards means the agent state was reset
                            (Some(old), Some(new)) if new < old => None,
                            (_, new) => new,
                        };
                        // Without an index Consul cannot block; poll instead of spinning
                        index.is_none()
                    }
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "Consul watch request failed, retrying");
                        true
                    }
                };

                if pause {
                    tokio::select! {
                        _ = tx.closed() => break,
                        _ = time::sleep(this.retry) => {}
                    }
                }
            }
            tracing::debug!(url = %url, "Consul watch stopped");
        });

        rx
    }
}

#[async_trait]
impl Discovery for ConsulDiscovery {
    async fn list_service_names(&self) -> DiscoveryResult<Vec<String>> {
        let url = self.endpoint(&["v1", "catalog", "services"])?;
        let (services, _) = self.fetch::<HashMap<String, Vec<String>>>(url, None).await?;
        Ok(to_names(services))
    }

    async fn list_service_nodes(&self, service: &str) -> DiscoveryResult<Vec<Node>> {
        let url = self.endpoint(&["v1", "health", "service", service])?;
        let (entries, _) = self.fetch::<Vec<HealthEntry>>(url, None).await?;
        Ok(to_nodes(entries))
    }

    async fn watch_service_list(&self) -> DiscoveryResult<mpsc::UnboundedReceiver<Vec<String>>> {
        let url = self.endpoint(&["v1", "catalog", "services"])?;
        Ok(self.spawn_watch(url, to_names))
    }

    async fn watch_service_nodes(
        &self,
        service: &str,
    ) -> DiscoveryResult<mpsc::UnboundedReceiver<Vec<Node>>> {
        let url = self.endpoint(&["v1", "health", "service", service])?;
        Ok(self.spawn_watch(url, to_nodes))
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> DiscoveryResult<T> {
    serde_json::from_slice(body).map_err(|e| DiscoveryError::InvalidResponse(e.to_string()))
}
