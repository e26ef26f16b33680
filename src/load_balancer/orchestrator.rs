//! Pool orchestration.
//!
//! # Responsibilities
//! - Build one pool per service name known to discovery
//! - Rebuild a service's pool when its node list changes
//! - Run the periodic health probe over every pool
//! - Entry point for endpoint selection
//!
//! # Design Decisions
//! - Pools live in a concurrent map; `choose` never blocks on a writer
//! - The bulk pass only adds pools; replacing a pool is the job of that
//!   service's own watcher task
//! - Watchers, the list watcher and the probe timer are tasks owned here and
//!   aborted on re-init (timer, list watcher) or shutdown (all)

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::schema::{CheckConfig, HealthCheckConfig, RouterConfig, RuleConfig};
use crate::discovery::{Discovery, Node};
use crate::error::{LbError, LbResult};
use crate::health::active::{probe_all, probe_url, HealthProbe, HttpProbe, ProbeTarget};
use crate::health::state::HealthState;
use crate::load_balancer::{
    endpoint::{Endpoint, EndpointStatus},
    pool::Pool,
    registry::{RuleFactory, RuleRegistry},
    round_robin::RoundRobin,
    Rule,
};
use crate::observability::metrics;

/// Rule and health-check settings resolved at init.
struct Settings {
    default_rule: RuleFactory,
    rules: HashMap<String, RuleFactory>,
    checks: HashMap<String, CheckConfig>,
    default_check: CheckConfig,
}

impl Settings {
    fn resolve(registry: &RuleRegistry, rules: &[RuleConfig], default_rule: &str) -> LbResult<Self> {
        let mut resolved = HashMap::new();
        let mut checks = HashMap::new();
        for rule in rules {
            if let Some(id) = &rule.rule {
                resolved.insert(rule.service.clone(), registry.resolve(id)?);
            }
            checks.insert(rule.service.clone(), rule.check.clone());
        }

        Ok(Self {
            default_rule: registry.resolve(default_rule)?,
            rules: resolved,
            checks,
            default_check: CheckConfig::default(),
        })
    }

    fn rule_for(&self, service: &str) -> RuleFactory {
        self.rules
            .get(service)
            .cloned()
            .unwrap_or_else(|| self.default_rule.clone())
    }

    fn check_for(&self, service: &str) -> &CheckConfig {
        self.checks.get(service).unwrap_or(&self.default_check)
    }
}

#[derive(Default)]
struct Tasks {
    timer: Option<JoinHandle<()>>,
    list_watcher: Option<JoinHandle<()>>,
    service_watchers: HashMap<String, JoinHandle<()>>,
}

impl Tasks {
    fn abort_all(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if let Some(watcher) = self.list_watcher.take() {
            watcher.abort();
        }
        for (_, watcher) in self.service_watchers.drain() {
            watcher.abort();
        }
    }
}

/// State shared with the background tasks.
struct Shared {
    discovery: Arc<dyn Discovery>,
    prober: Arc<dyn HealthProbe>,
    pools: DashMap<String, Arc<Pool>>,
    settings: ArcSwap<Settings>,
    tasks: Mutex<Tasks>,
    /// Services whose pool or node watch could not be set up
    retry: Mutex<BTreeSet<String>>,
}

impl Shared {
    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn retry(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.retry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add pools for service names not seen before. Known names are skipped.
    ///
    /// The node watch is opened before the node list is read, so a change
    /// landing in between is queued for the watcher instead of lost. A service
    /// whose nodes cannot be listed is skipped and remembered for a retry.
    async fn reconcile(self: &Arc<Self>, services: Vec<String>) {
        for service in services {
            if service.is_empty() || self.pools.contains_key(&service) {
                continue;
            }

            let factory = self.settings.load().rule_for(&service);
            let rx = match self.discovery.watch_service_nodes(&service).await {
                Ok(rx) => Some(rx),
                Err(e) => {
                    tracing::warn!(service = %service, error = %e, "Failed to watch service nodes");
                    None
                }
            };

            let nodes = match self.discovery.list_service_nodes(&service).await {
                Ok(nodes) => nodes,
                Err(e) => {
                    tracing::warn!(service = %service, error = %e, "Failed to list service nodes, will retry");
                    self.retry().insert(service.clone());
                    // The watcher still creates the pool on the next node update
                    if let Some(rx) = rx {
                        self.spawn_watcher(service, rx, factory);
                    }
                    continue;
                }
            };

            match self.pools.entry(service.clone()) {
                // Another reconcile pass got here first while we were listing nodes
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let pool = Pool::from_nodes(service.clone(), &nodes, None, factory());
                    tracing::info!(service = %service, endpoints = pool.len(), "Pool created");
                    record_pool(&pool);
                    slot.insert(Arc::new(pool));
                }
            }

            self.retry().remove(&service);
            match rx {
                Some(rx) => self.spawn_watcher(service, rx, factory),
                None => {
                    self.retry().insert(service);
                }
            }
        }
    }

    /// Retry services whose last reconcile attempt failed.
    async fn reconcile_failed(self: &Arc<Self>) {
        let failed = std::mem::take(&mut *self.retry());
        if failed.is_empty() {
            return;
        }
        tracing::debug!(count = failed.len(), "Retrying service reconciliation");

        let mut missing = Vec::new();
        for service in failed {
            if self.pools.contains_key(&service) {
                self.resubscribe(service).await;
            } else {
                missing.push(service);
            }
        }
        self.reconcile(missing).await;
    }

    /// Open the node watch of a service that has a pool but no watcher.
    async fn resubscribe(self: &Arc<Self>, service: String) {
        let rx = match self.discovery.watch_service_nodes(&service).await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::warn!(service = %service, error = %e, "Failed to watch service nodes, will retry");
                self.retry().insert(service);
                return;
            }
        };

        let factory = self.settings.load().rule_for(&service);
        // Changes made while unsubscribed are picked up by one fresh listing
        match self.discovery.list_service_nodes(&service).await {
            Ok(nodes) => self.rebuild(&service, &nodes, &factory),
            Err(e) => {
                tracing::warn!(service = %service, error = %e, "Failed to list service nodes, will retry");
                self.retry().insert(service.clone());
            }
        }
        self.spawn_watcher(service, rx, factory);
    }

    /// Drain one service's node watch, rebuilding its pool on every update.
    fn spawn_watcher(
        self: &Arc<Self>,
        service: String,
        mut rx: mpsc::UnboundedReceiver<Vec<Node>>,
        factory: RuleFactory,
    ) {
        let shared = Arc::clone(self);
        let name = service.clone();
        let handle = tokio::spawn(async move {
            while let Some(nodes) = rx.recv().await {
                shared.rebuild(&name, &nodes, &factory);
            }
            tracing::debug!(service = %name, "Service watch ended");
        });

        if let Some(previous) = self.tasks().service_watchers.insert(service, handle) {
            previous.abort();
        }
    }

    /// Replace a service's pool, carrying health cells forward by identity.
    fn rebuild(&self, service: &str, nodes: &[Node], factory: &RuleFactory) {
        let previous = self.pools.get(service).map(|p| Arc::clone(p.value()));
        let pool = Pool::from_nodes(service, nodes, previous.as_deref(), factory());
        tracing::info!(service = %service, endpoints = pool.len(), "Pool rebuilt");
        record_pool(&pool);
        self.pools.insert(service.to_string(), Arc::new(pool));
    }

    /// Collect every non-passing endpoint with its probe URL.
    fn probe_targets(&self) -> Vec<ProbeTarget> {
        let settings = self.settings.load();
        let mut targets = Vec::new();
        for entry in self.pools.iter() {
            let check = settings.check_for(entry.key());
            for endpoint in entry.value().endpoints() {
                if endpoint.status() == HealthState::Passing {
                    continue;
                }
                targets.push(ProbeTarget {
                    service: entry.key().clone(),
                    endpoint: Arc::clone(endpoint),
                    url: probe_url(check, endpoint),
                });
            }
        }
        targets
    }

    async fn probe_round(&self) -> usize {
        let targets = self.probe_targets();
        if targets.is_empty() {
            return 0;
        }
        tracing::debug!(count = targets.len(), "Probing non-passing endpoints");
        probe_all(Arc::clone(&self.prober), targets).await
    }
}

fn record_pool(pool: &Pool) {
    metrics::record_pool_size(pool.service(), pool.len());
    for endpoint in pool.endpoints() {
        metrics::record_endpoint_health(pool.service(), endpoint.id().as_str(), endpoint.status());
    }
}

/// Owns every service pool and the tasks keeping them current.
pub struct Orchestrator {
    shared: Arc<Shared>,
    registry: RuleRegistry,
    health_check: HealthCheckConfig,
}

impl Orchestrator {
    /// Orchestrator with built-in rules, an HTTP prober and default probing.
    pub fn new(discovery: Arc<dyn Discovery>) -> Self {
        Self::builder(discovery).build()
    }

    pub fn builder(discovery: Arc<dyn Discovery>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            discovery,
            registry: RuleRegistry::with_builtins(),
            prober: None,
            health_check: HealthCheckConfig::default(),
        }
    }

    /// Build and initialize from a loaded configuration.
    pub async fn from_config(discovery: Arc<dyn Discovery>, config: &RouterConfig) -> LbResult<Self> {
        let prober = HttpProbe::new(config.health_check.timeout_secs.map(Duration::from_secs))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default probe client");
                HttpProbe::default()
            });
        let orchestrator = Self::builder(discovery)
            .health_check(config.health_check.clone())
            .prober(Arc::new(prober))
            .build();
        orchestrator.init(&config.rules, &config.default_rule).await?;
        Ok(orchestrator)
    }

    /// Build pools for every known service, subscribe to changes and start probing.
    ///
    /// Calling init again replaces the rule settings, the service-list watcher
    /// and the probe timer. Existing pools are kept.
    pub async fn init(&self, rules: &[RuleConfig], default_rule: &str) -> LbResult<()> {
        let settings = Settings::resolve(&self.registry, rules, default_rule)?;
        self.shared.settings.store(Arc::new(settings));

        // Subscribe first so services registered while listing are not missed
        let mut rx = self.shared.discovery.watch_service_list().await?;
        let services = self.shared.discovery.list_service_names().await?;
        tracing::info!(services = services.len(), "Initializing load balancer");
        self.shared.reconcile(services).await;

        let shared = Arc::clone(&self.shared);
        let list_watcher = tokio::spawn(async move {
            while let Some(services) = rx.recv().await {
                shared.reconcile_failed().await;
                shared.reconcile(services).await;
            }
            tracing::debug!("Service list watch ended");
        });

        let timer = self.spawn_timer();

        let mut tasks = self.shared.tasks();
        if let Some(previous) = tasks.list_watcher.replace(list_watcher) {
            previous.abort();
        }
        if let Some(previous) = std::mem::replace(&mut tasks.timer, timer) {
            previous.abort();
        }
        Ok(())
    }

    fn spawn_timer(&self) -> Option<JoinHandle<()>> {
        if !self.health_check.enabled {
            tracing::info!("Active health checks disabled");
            return None;
        }

        let period = Duration::from_secs(self.health_check.interval_secs.max(1));
        let shared = Arc::clone(&self.shared);
        Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Each round runs on its own so a slow probe never delays the next tick
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    shared.reconcile_failed().await;
                    shared.probe_round().await;
                });
            }
        }))
    }

    /// Choose one endpoint of `service` through its pool's rule.
    pub fn choose(&self, service: &str) -> LbResult<Arc<Endpoint>> {
        let pool = self.get_pool(service)?;
        let endpoint = pool.choose_service()?;
        tracing::trace!(service = %service, endpoint = %endpoint.id(), "Endpoint chosen");
        metrics::record_selection(service, endpoint.id().as_str());
        Ok(endpoint)
    }

    /// The current pool of `service`.
    pub fn get_pool(&self, service: &str) -> LbResult<Arc<Pool>> {
        self.shared
            .pools
            .get(service)
            .map(|p| Arc::clone(p.value()))
            .ok_or_else(|| LbError::ServiceNotRegistered(service.to_string()))
    }

    /// Every pool's endpoints with their current status.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<EndpointStatus>> {
        self.shared
            .pools
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    /// Names of all services with a pool.
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.pools.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Run one probe round now and wait for it. Returns how many endpoints passed.
    pub async fn probe_now(&self) -> usize {
        self.shared.probe_round().await
    }

    /// Stop the probe timer and every watcher. Pools stay readable.
    pub fn shutdown(&self) {
        self.shared.tasks().abort_all();
        tracing::info!("Load balancer stopped");
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shared.tasks().abort_all();
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("services", &self.services())
            .field("registry", &self.registry)
            .finish()
    }
}

/// Builder for an [`Orchestrator`].
pub struct OrchestratorBuilder {
    discovery: Arc<dyn Discovery>,
    registry: RuleRegistry,
    prober: Option<Arc<dyn HealthProbe>>,
    health_check: HealthCheckConfig,
}

impl OrchestratorBuilder {
    pub fn rule_registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn prober(mut self, prober: Arc<dyn HealthProbe>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn health_check(mut self, health_check: HealthCheckConfig) -> Self {
        self.health_check = health_check;
        self
    }

    pub fn build(self) -> Orchestrator {
        let prober = self
            .prober
            .unwrap_or_else(|| Arc::new(HttpProbe::default()));

        // Placeholder settings until init resolves the configured rules
        let round_robin: RuleFactory = Arc::new(|| -> Box<dyn Rule> { Box::new(RoundRobin::new()) });
        let settings = Settings {
            default_rule: round_robin,
            rules: HashMap::new(),
            checks: HashMap::new(),
            default_check: CheckConfig::default(),
        };

        Orchestrator {
            shared: Arc::new(Shared {
                discovery: self.discovery,
                prober,
                pools: DashMap::new(),
                settings: ArcSwap::from_pointee(settings),
                tasks: Mutex::new(Tasks::default()),
                retry: Mutex::new(BTreeSet::new()),
            }),
            registry: self.registry,
            health_check: self.health_check,
        }
    }
}
