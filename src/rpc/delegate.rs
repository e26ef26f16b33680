//! Call delegation.
//!
//! The proxy hands every load-balanced call to a [`Delegate`] together with
//! the chosen endpoint, so per-endpoint concerns can wrap the call without
//! re-deriving the target from the stub.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::error::RpcResult;
use crate::load_balancer::endpoint::Endpoint;
use crate::observability::metrics;
use crate::rpc::transport::MethodStub;

#[async_trait]
pub trait Delegate: Send + Sync + 'static {
    async fn execute(
        &self,
        endpoint: &Arc<Endpoint>,
        service: &str,
        method: &str,
        stub: MethodStub,
        params: Value,
    ) -> RpcResult<Value>;
}

/// Invokes the stub and returns its outcome untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDelegate;

#[async_trait]
impl Delegate for DirectDelegate {
    async fn execute(
        &self,
        _endpoint: &Arc<Endpoint>,
        _service: &str,
        _method: &str,
        stub: MethodStub,
        params: Value,
    ) -> RpcResult<Value> {
        Ok(stub(params).await?)
    }
}

/// Records call metrics per endpoint around another delegate.
#[derive(Debug, Clone, Default)]
pub struct InstrumentedDelegate<D> {
    inner: D,
}

impl<D: Delegate> InstrumentedDelegate<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<D: Delegate> Delegate for InstrumentedDelegate<D> {
    async fn execute(
        &self,
        endpoint: &Arc<Endpoint>,
        service: &str,
        method: &str,
        stub: MethodStub,
        params: Value,
    ) -> RpcResult<Value> {
        let started = Instant::now();
        let result = self.inner.execute(endpoint, service, method, stub, params).await;

        metrics::record_rpc_call(service, method, endpoint.id().as_str(), result.is_ok(), started);
        match &result {
            Ok(_) => tracing::debug!(
                service = %service,
                method = %method,
                endpoint = %endpoint.id(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "RPC call completed"
            ),
            Err(e) => tracing::debug!(
                service = %service,
                method = %method,
                endpoint = %endpoint.id(),
                error = %e,
                "RPC call failed"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RpcError, TransportError};
    use crate::health::state::HealthState;
    use crate::rpc::transport::RpcFuture;
    use serde_json::json;

    fn echo() -> MethodStub {
        Arc::new(|params: Value| -> RpcFuture { Box::pin(async move { Ok(params) }) })
    }

    fn failing() -> MethodStub {
        Arc::new(|_: Value| -> RpcFuture {
            Box::pin(async move {
                Err(TransportError::Remote {
                    code: -32000,
                    message: "boom".into(),
                })
            })
        })
    }

    #[tokio::test]
    async fn test_direct_passes_through() {
        let endpoint = Arc::new(Endpoint::new("10.0.0.1", 9000, HealthState::Passing));
        let out = DirectDelegate
            .execute(&endpoint, "OrderService", "get", echo(), json!([1, 2]))
            .await
            .unwrap();
        assert_eq!(out, json!([1, 2]));
    }

    #[tokio::test]
    async fn test_instrumented_keeps_errors() {
        let endpoint = Arc::new(Endpoint::new("10.0.0.1", 9000, HealthState::Passing));
        let delegate = InstrumentedDelegate::new(DirectDelegate);
        let err = delegate
            .execute(&endpoint, "OrderService", "get", failing(), Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RpcError::Transport(TransportError::Remote { code: -32000, .. })
        ));
    }
}
