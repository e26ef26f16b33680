//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::load_balancer::registry::ROUND_ROBIN;

/// Root configuration for the service router.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Rule identifier applied to services without an override.
    pub default_rule: String,

    /// Per-service rule and health-check overrides.
    pub rules: Vec<RuleConfig>,

    /// Periodic health probing.
    pub health_check: HealthCheckConfig,

    /// Discovery backend selection.
    pub discovery: DiscoveryConfig,

    /// RPC clients routed through the load balancer.
    pub clients: Vec<ClientConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_rule: ROUND_ROBIN.to_string(),
            rules: Vec::new(),
            health_check: HealthCheckConfig::default(),
            discovery: DiscoveryConfig::default(),
            clients: Vec::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Per-service override.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Logical service name as known to discovery.
    pub service: String,

    /// Rule identifier; falls back to `default_rule` when absent.
    #[serde(default)]
    pub rule: Option<String>,

    /// Health probe target for this service's endpoints.
    #[serde(default)]
    pub check: CheckConfig,
}

/// Health probe target: `protocol://address:port{path}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckConfig {
    pub protocol: String,

    #[serde(alias = "url")]
    pub path: String,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            path: "/health".to_string(),
        }
    }
}

/// Health probing schedule.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable periodic probing of non-passing endpoints.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Optional per-probe timeout in seconds. Unset means the HTTP client's default.
    pub timeout_secs: Option<u64>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: None,
        }
    }
}

/// Discovery backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// `memory` or `consul`.
    pub backend: String,

    pub consul: ConsulConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            consul: ConsulConfig::default(),
        }
    }
}

/// Consul agent connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsulConfig {
    /// Agent base URL.
    pub url: String,

    /// Blocking query wait time in seconds.
    pub wait_secs: u64,

    /// Delay before retrying a failed watch request, in seconds.
    pub retry_secs: u64,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8500".to_string(),
            wait_secs: 55,
            retry_secs: 1,
        }
    }
}

/// An RPC service and the methods it exposes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceDefinition {
    /// Fully qualified service name, e.g. `shop.OrderService`.
    pub name: String,

    pub methods: Vec<String>,
}

/// One RPC client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Discovery service name whose pool routes this client's calls.
    pub service: String,

    /// Static `host:port` (or URL) used when no pool is available.
    #[serde(default)]
    pub url: Option<String>,

    /// Services reachable through this client.
    #[serde(default)]
    pub definitions: Vec<ServiceDefinition>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter (overridden by `RUST_LOG`).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Expose Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics listener address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
