//! Transport seam.
//!
//! A [`Transport`] builds clients bound to one target. A [`TransportClient`]
//! derives callable stubs, one per remote method. Stubs are cheap to clone and
//! cached by the proxy.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{RpcResult, TransportResult};

/// Future returned by a method stub.
pub type RpcFuture = BoxFuture<'static, TransportResult<Value>>;

/// A remote method bound to one client.
pub type MethodStub = Arc<dyn Fn(Value) -> RpcFuture + Send + Sync>;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Build a client for `target`, either `host:port` or a full URL.
    async fn connect(&self, target: &str) -> TransportResult<Arc<dyn TransportClient>>;
}

pub trait TransportClient: Send + Sync {
    /// Bind `service.method` on this client.
    fn stub(&self, service: &str, method: &str) -> RpcResult<MethodStub>;
}
