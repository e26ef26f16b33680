//! RPC client subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceProxy::call
//!     → proxy.rs (route via the context's orchestrator, cache clients and stubs)
//!     → delegate.rs (per-endpoint wrapping, metrics)
//!     → transport.rs stub
//!         → http.rs + jsonrpc.rs (JSON-RPC 2.0 over HTTP)
//! ```
//!
//! # Design Decisions
//! - Method sets are declared up front (`ServiceType` or config definitions)
//! - Stub construction validates names before any network activity
//! - The transport is a trait; HTTP JSON-RPC is the bundled implementation

pub mod delegate;
pub mod http;
pub mod jsonrpc;
pub mod proxy;
pub mod transport;

pub use delegate::{Delegate, DirectDelegate, InstrumentedDelegate};
pub use http::HttpTransport;
pub use proxy::{RpcClient, ServiceProxy, ServiceType};
pub use transport::{MethodStub, RpcFuture, Transport, TransportClient};
