//! Client-side service routing: discovery-driven endpoint pools, pluggable
//! selection rules, active health probing and a load-balanced RPC proxy.

pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod health;
pub mod load_balancer;
pub mod observability;
pub mod rpc;

pub use config::schema::RouterConfig;
pub use context::{Context, ContextObserver};
pub use discovery::{ConsulDiscovery, Discovery, MemoryDiscovery, Node};
pub use error::{LbError, RpcError};
pub use health::HealthState;
pub use load_balancer::{Orchestrator, Pool, Rule, RuleRegistry};
pub use rpc::{HttpTransport, RpcClient, ServiceProxy, ServiceType};
