//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → rules/default rule  → Orchestrator::init
//!     → health_check        → probe timer
//!     → clients             → RpcClient
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; re-running init applies a new one
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::CheckConfig;
pub use schema::ClientConfig;
pub use schema::RouterConfig;
pub use schema::RuleConfig;
pub use schema::ServiceDefinition;
