//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery snapshot / watch update
//!     → orchestrator.rs (one pool per service name)
//!     → pool.rs (endpoints + bound rule)
//!     → Apply selection rule:
//!         - round_robin.rs (rotate through endpoints)
//!         - random.rs (uniform or status-weighted random)
//!     → endpoint.rs (chosen endpoint, identity + health handle)
//! ```
//!
//! # Design Decisions
//! - Rules are constructed per pool; rebuilding a pool resets rule state
//! - Whether unhealthy endpoints are eligible is a property of the rule
//! - Health state is shared by endpoint identity, not owned by a pool
//! - Pools are immutable; composition changes swap in a new pool

pub mod endpoint;
pub mod orchestrator;
pub mod pool;
pub mod random;
pub mod registry;
pub mod round_robin;

use std::fmt::Debug;
use std::sync::Arc;

use crate::load_balancer::endpoint::Endpoint;

pub use endpoint::{EndpointId, EndpointStatus};
pub use orchestrator::Orchestrator;
pub use pool::Pool;
pub use registry::RuleRegistry;

/// A selection strategy over an ordered endpoint sequence.
pub trait Rule: Send + Sync + Debug {
    /// Pick one endpoint, or `None` if the rule accepts none of them.
    fn choose(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>>;
}
