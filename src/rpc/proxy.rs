//! Load-balanced RPC client proxy.
//!
//! # Call path
//! ```text
//! ServiceProxy::call(method, params)
//!     → context orchestrator has a pool for the route?
//!         no  → static client stub (built at construction) or Unroutable
//!         yes → orchestrator.choose(route)
//!             → stub cache (endpoint, method)
//!                 miss → client cache (endpoint) → transport.connect
//!             → delegate.execute(endpoint, stub, params)
//! ```
//!
//! # Design Decisions
//! - The orchestrator is read from the context on every call, never captured
//! - Caches only grow; an endpoint that leaves its pool keeps its client
//! - Transport errors reach the caller unchanged

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::schema::ClientConfig;
use crate::config::validation::{is_identifier, is_service_name};
use crate::context::Context;
use crate::error::{RpcError, RpcResult};
use crate::load_balancer::endpoint::{Endpoint, EndpointId};
use crate::rpc::delegate::{Delegate, DirectDelegate, InstrumentedDelegate};
use crate::rpc::transport::{MethodStub, Transport, TransportClient};

/// A remote service interface known at compile time.
pub trait ServiceType {
    /// Fully qualified service name, e.g. `orders.OrderService`.
    const NAME: &'static str;
    const METHODS: &'static [&'static str];
}

struct ClientShared {
    route: String,
    transport: Arc<dyn Transport>,
    context: Arc<Context>,
    delegate: Arc<dyn Delegate>,
    fallback: Option<Arc<dyn TransportClient>>,
    clients: DashMap<EndpointId, Arc<dyn TransportClient>>,
}

impl ClientShared {
    async fn client_for(&self, endpoint: &Endpoint) -> RpcResult<Arc<dyn TransportClient>> {
        if let Some(client) = self.clients.get(endpoint.id()) {
            return Ok(Arc::clone(client.value()));
        }

        let client = self.transport.connect(&endpoint.authority()).await?;
        tracing::debug!(route = %self.route, endpoint = %endpoint.id(), "Endpoint client cached");
        Ok(Arc::clone(
            self.clients.entry(endpoint.id().clone()).or_insert(client).value(),
        ))
    }
}

/// Client for one routed service name, producing per-interface proxies.
pub struct RpcClient {
    definitions: HashMap<String, Vec<String>>,
    shared: Arc<ClientShared>,
}

impl RpcClient {
    /// Build a client for `config.service`.
    ///
    /// When `config.url` is set a static client is connected now and used for
    /// calls that cannot be load balanced.
    pub async fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        context: Arc<Context>,
    ) -> RpcResult<Self> {
        let fallback = match &config.url {
            Some(url) => Some(transport.connect(url).await?),
            None => None,
        };
        let definitions = config
            .definitions
            .into_iter()
            .map(|d| (d.name, d.methods))
            .collect();

        Ok(Self {
            definitions,
            shared: Arc::new(ClientShared {
                route: config.service,
                transport,
                context,
                delegate: Arc::new(InstrumentedDelegate::new(DirectDelegate)),
                fallback,
                clients: DashMap::new(),
            }),
        })
    }

    /// Replace the delegate used for load-balanced calls.
    ///
    /// Only affects proxies created afterwards.
    pub fn with_delegate(mut self, delegate: Arc<dyn Delegate>) -> Self {
        let shared = ClientShared {
            route: self.shared.route.clone(),
            transport: Arc::clone(&self.shared.transport),
            context: Arc::clone(&self.shared.context),
            delegate,
            fallback: self.shared.fallback.clone(),
            clients: DashMap::new(),
        };
        self.shared = Arc::new(shared);
        self
    }

    /// Service name this client routes through the load balancer.
    pub fn route(&self) -> &str {
        &self.shared.route
    }

    /// Proxy for a statically declared interface.
    pub fn get_service<S: ServiceType>(&self) -> RpcResult<ServiceProxy> {
        self.build_proxy(S::NAME, S::METHODS.iter().copied())
    }

    /// Proxy for an interface declared in the client's definitions.
    pub fn get_service_named(&self, name: &str) -> RpcResult<ServiceProxy> {
        let methods = self
            .definitions
            .get(name)
            .ok_or_else(|| RpcError::UnknownService(name.to_string()))?;
        self.build_proxy(name, methods.iter().map(String::as_str))
    }

    /// Number of endpoint clients built so far.
    pub fn cached_clients(&self) -> usize {
        self.shared.clients.len()
    }

    fn build_proxy<'a>(
        &self,
        service: &str,
        methods: impl Iterator<Item = &'a str>,
    ) -> RpcResult<ServiceProxy> {
        let methods: Vec<String> = methods.map(str::to_string).collect();
        if !is_service_name(service) {
            return Err(RpcError::NoSuchMethod {
                service: service.to_string(),
                method: methods.first().cloned().unwrap_or_default(),
            });
        }

        let mut static_stubs = HashMap::new();
        for method in &methods {
            if !is_identifier(method) {
                return Err(RpcError::NoSuchMethod {
                    service: service.to_string(),
                    method: method.clone(),
                });
            }
            if let Some(fallback) = &self.shared.fallback {
                static_stubs.insert(method.clone(), fallback.stub(service, method)?);
            }
        }

        Ok(ServiceProxy {
            service: service.to_string(),
            methods,
            static_stubs,
            stubs: DashMap::new(),
            shared: Arc::clone(&self.shared),
        })
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("route", &self.shared.route)
            .field("static", &self.shared.fallback.is_some())
            .field("cached_clients", &self.shared.clients.len())
            .finish()
    }
}

/// Callable view of one remote interface.
pub struct ServiceProxy {
    service: String,
    methods: Vec<String>,
    static_stubs: HashMap<String, MethodStub>,
    stubs: DashMap<(EndpointId, String), MethodStub>,
    shared: Arc<ClientShared>,
}

impl ServiceProxy {
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    /// Invoke `method` with JSON params.
    pub async fn call(&self, method: &str, params: Value) -> RpcResult<Value> {
        if !self.methods.iter().any(|m| m == method) {
            return Err(RpcError::NoSuchMethod {
                service: self.service.clone(),
                method: method.to_string(),
            });
        }

        let route = &self.shared.route;
        let orchestrator = self
            .shared
            .context
            .orchestrator()
            .filter(|o| o.get_pool(route).is_ok());

        let Some(orchestrator) = orchestrator else {
            let stub = self
                .static_stubs
                .get(method)
                .ok_or_else(|| RpcError::Unroutable(route.clone()))?;
            tracing::trace!(route = %route, method = %method, "Calling static client");
            return Ok(stub(params).await?);
        };

        let endpoint = orchestrator.choose(route)?;
        let stub = self.stub_for(&endpoint, method).await?;
        self.shared
            .delegate
            .execute(&endpoint, &self.service, method, stub, params)
            .await
    }

    /// Invoke `method` with a serializable request, decoding the response.
    pub async fn call_typed<Req, Resp>(&self, method: &str, request: &Req) -> RpcResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let params = serde_json::to_value(request)?;
        let result = self.call(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn stub_for(&self, endpoint: &Endpoint, method: &str) -> RpcResult<MethodStub> {
        let key = (endpoint.id().clone(), method.to_string());
        if let Some(stub) = self.stubs.get(&key) {
            return Ok(Arc::clone(stub.value()));
        }

        let client = self.shared.client_for(endpoint).await?;
        let stub = client.stub(&self.service, method)?;
        Ok(Arc::clone(self.stubs.entry(key).or_insert(stub).value()))
    }

    /// Number of endpoint-bound stubs built so far.
    pub fn cached_stubs(&self) -> usize {
        self.stubs.len()
    }
}

impl std::fmt::Debug for ServiceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProxy")
            .field("service", &self.service)
            .field("route", &self.shared.route)
            .field("methods", &self.methods)
            .finish()
    }
}
