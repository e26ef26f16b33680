//! JSON-RPC over HTTP.
//!
//! Every call is one `POST /` carrying a JSON-RPC request whose method is
//! `Service.method`. Connection pooling is left to reqwest, so `connect`
//! only resolves the target URL.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::{RpcResult, TransportError, TransportResult};
use crate::rpc::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use crate::rpc::transport::{MethodStub, RpcFuture, Transport, TransportClient};

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    next_id: Arc<AtomicU64>,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl HttpTransport {
    /// Transport with an optional per-request timeout.
    pub fn new(timeout: Option<Duration>) -> TransportResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent("service-router");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }
}

fn target_url(target: &str) -> TransportResult<Url> {
    let raw = if target.contains("://") {
        target.to_string()
    } else {
        format!("http://{}/", target)
    };
    Url::parse(&raw).map_err(|e| TransportError::Connect {
        target: target.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self, target: &str) -> TransportResult<Arc<dyn TransportClient>> {
        let url = target_url(target)?;
        tracing::debug!(peer = %target, url = %url, "JSON-RPC client created");
        Ok(Arc::new(HttpClient {
            client: self.client.clone(),
            url,
            next_id: Arc::clone(&self.next_id),
        }))
    }
}

/// Client bound to one JSON-RPC endpoint.
#[derive(Debug)]
struct HttpClient {
    client: reqwest::Client,
    url: Url,
    next_id: Arc<AtomicU64>,
}

impl TransportClient for HttpClient {
    fn stub(&self, service: &str, method: &str) -> RpcResult<MethodStub> {
        let client = self.client.clone();
        let url = self.url.clone();
        let next_id = Arc::clone(&self.next_id);
        let qualified = format!("{}.{}", service, method);

        let stub: MethodStub = Arc::new(move |params: Value| -> RpcFuture {
            let request = JsonRpcRequest::new(
                qualified.clone(),
                params,
                next_id.fetch_add(1, Ordering::Relaxed),
            );
            let client = client.clone();
            let url = url.clone();
            Box::pin(async move { send(&client, url, request).await })
        });
        Ok(stub)
    }
}

async fn send(client: &reqwest::Client, url: Url, request: JsonRpcRequest) -> TransportResult<Value> {
    let response = client.post(url).json(&request).send().await?;
    // Servers may answer a failed call with a non-2xx status and an error object
    let status_error = response.error_for_status_ref().err();
    let bytes = response.bytes().await?;
    match serde_json::from_slice::<JsonRpcResponse>(&bytes) {
        Ok(body) => body.into_result(&request.id),
        Err(e) => match status_error {
            Some(err) => Err(err.into()),
            None => Err(TransportError::InvalidResponse(e.to_string())),
        },
    }
}
