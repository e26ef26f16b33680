//! JSON-RPC 2.0 envelope types.
//!
//! - Request: `{"jsonrpc": "2.0", "method": "...", "params": ..., "id": ...}`
//! - Response: `{"jsonrpc": "2.0", "result": ..., "error": ..., "id": ...}`
//! - Error: `{"code": ..., "message": "...", "data": ...}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TransportError, TransportResult};

pub const JSONRPC_VERSION: &str = "2.0";

/// The method does not exist / is not available
pub const METHOD_NOT_FOUND: i32 = -32601;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Qualified method name, `Service.method`
    pub method: String,
    pub params: Value,
    pub id: Value,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: method.into(),
            params,
            id: Value::from(id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Unwrap the call outcome, checking the response answers request `id`.
    ///
    /// A missing or null `result` without an error is a null result.
    pub fn into_result(self, id: &Value) -> TransportResult<Value> {
        if let Some(error) = self.error {
            return Err(TransportError::Remote {
                code: error.code,
                message: error.message,
            });
        }
        if self.id != *id {
            return Err(TransportError::InvalidResponse(format!(
                "response id {} does not match request id {}",
                self.id, id
            )));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = JsonRpcRequest::new("OrderService.get", json!({"id": 7}), 3);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "method": "OrderService.get", "params": {"id": 7}, "id": 3})
        );
    }

    #[test]
    fn test_error_object_maps_to_remote() {
        let body = r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":1}"#;
        let response: JsonRpcResponse = serde_json::from_str(body).unwrap();
        match response.into_result(&json!(1)) {
            Err(TransportError::Remote { code, message }) => {
                assert_eq!(code, METHOD_NOT_FOUND);
                assert_eq!(message, "Method not found");
            }
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[test]
    fn test_null_result() {
        let body = r#"{"jsonrpc":"2.0","result":null,"id":4}"#;
        let response: JsonRpcResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.into_result(&json!(4)).unwrap(), Value::Null);
    }

    #[test]
    fn test_id_mismatch() {
        let response = JsonRpcResponse::success(json!(2), json!("ok"));
        assert!(matches!(
            response.into_result(&json!(1)),
            Err(TransportError::InvalidResponse(_))
        ));
    }
}
