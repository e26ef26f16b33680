//! Error types shared across subsystems.

use thiserror::Error;

/// Errors raised by the load balancing core.
#[derive(Debug, Error)]
pub enum LbError {
    /// No pool exists for the requested service name.
    #[error("service {0} is not registered")]
    ServiceNotRegistered(String),

    /// The pool exists but its rule produced no endpoint.
    #[error("no available endpoint for service {0}")]
    NoAvailableEndpoint(String),

    /// A rule identifier is not present in the rule registry.
    #[error("unknown rule: {0}")]
    UnknownRule(String),

    /// The discovery backend failed while building pools.
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
}

/// Result type for load balancing operations.
pub type LbResult<T> = Result<T, LbError>;

/// Errors raised by discovery backends.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The backend could not be reached.
    #[error("discovery request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with something we cannot interpret.
    #[error("invalid discovery response: {0}")]
    InvalidResponse(String),

    /// The backend address is not a usable URL.
    #[error("invalid discovery url: {0}")]
    InvalidUrl(String),

    /// The configured backend name is not supported.
    #[error("unknown discovery backend: {0}")]
    UnknownBackend(String),
}

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Errors returned by a single health probe.
///
/// Probe errors never leave the health subsystem; they are logged and dropped.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid probe url: {0}")]
    InvalidUrl(String),

    #[error("probe failed: {0}")]
    Failed(String),
}

/// Errors produced by an RPC transport while executing a call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A client could not be built for the target.
    #[error("connect to {target} failed: {reason}")]
    Connect { target: String, reason: String },

    /// HTTP-level failure.
    #[error("transport request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote side returned an error object.
    #[error("remote error {code}: {message}")]
    Remote { code: i32, message: String },

    /// The remote side answered with a malformed response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors surfaced by the RPC client proxy.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Malformed or undeclared service/method name. Raised while building stubs.
    #[error("no such method {service}.{method}")]
    NoSuchMethod { service: String, method: String },

    /// The service is not declared for this client.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// Neither a pool nor a static client can serve the call.
    #[error("no route to service {0}: no pool registered and no static client configured")]
    Unroutable(String),

    /// The load balancer refused to choose an endpoint.
    #[error(transparent)]
    Balance(#[from] LbError),

    /// The underlying transport failed. Never retried or rewritten.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Typed request or response could not be (de)serialized.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Result type for RPC proxy operations.
pub type RpcResult<T> = Result<T, RpcError>;
