//! Shared utilities for integration tests.

use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use service_router::rpc::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// A parsed HTTP request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

async fn read_request(socket: &mut TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(MockRequest {
        method,
        path,
        body: buf[header_end..].to_vec(),
    })
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Backend answering `path` with `status` and everything else with 404.
#[allow(dead_code)]
pub async fn start_health_backend(path: &'static str, status: u16) -> SocketAddr {
    start_programmable_backend(move |request| async move {
        if request.path == path {
            (status, String::new())
        } else {
            (404, String::new())
        }
    })
    .await
}

/// JSON-RPC backend echoing its name, the method and the params.
///
/// Methods ending in `.fail` answer with a JSON-RPC error object.
#[allow(dead_code)]
pub async fn start_jsonrpc_backend(name: &'static str) -> SocketAddr {
    start_programmable_backend(move |request| async move {
        let Ok(call) = serde_json::from_slice::<JsonRpcRequest>(&request.body) else {
            return (500, String::new());
        };
        let response = if call.method.ends_with(".fail") {
            JsonRpcResponse::error(call.id, JsonRpcError::new(-32000, format!("{} failed", name)))
        } else {
            JsonRpcResponse::success(
                call.id,
                json!({"backend": name, "method": call.method, "params": call.params}),
            )
        };
        (200, serde_json::to_string(&response).unwrap())
    })
    .await
}

/// Field `backend` of a JSON-RPC echo result.
#[allow(dead_code)]
pub fn backend_of(value: &Value) -> &str {
    value["backend"].as_str().unwrap_or_default()
}
