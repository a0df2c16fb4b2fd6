//! JSON-RPC 2.0 message types for LSP communication.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::reply::ServerFault;
use crate::server::ServerNotification;

/// Thread-safe request ID generator.
static REQUEST_ID: AtomicI64 = AtomicI64::new(1);

/// Generates a unique request ID.
///
/// IDs are monotonically increasing and thread-safe.
#[must_use]
pub fn next_request_id() -> i64 {
    REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// A JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always "2.0".
    pub jsonrpc: &'static str,
    /// Unique request identifier.
    pub id: i64,
    /// The method to invoke.
    pub method: String,
    /// Optional parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Creates a new request with an auto-generated ID.
    ///
    /// A `null` parameter value is omitted from the wire form.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self::with_id(next_request_id(), method, params)
    }

    /// Creates a new request with a specific ID.
    #[must_use]
    pub fn with_id(id: i64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params: non_null(params),
        }
    }
}

/// A JSON-RPC 2.0 notification (no response expected).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    /// Protocol version, always "2.0".
    pub jsonrpc: &'static str,
    /// The method to invoke.
    pub method: String,
    /// Optional parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Creates a new notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params: non_null(params),
        }
    }
}

/// Successful reply the client sends to a server-initiated request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResult {
    /// Protocol version, always "2.0".
    pub jsonrpc: &'static str,
    /// Identifier copied from the server's request.
    pub id: Value,
    /// Result payload.
    pub result: Value,
}

impl JsonRpcResult {
    /// Builds a `null` result for the request `id`.
    #[must_use]
    pub fn null(id: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Value::Null,
        }
    }
}

/// A JSON-RPC 2.0 response message.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version.
    pub jsonrpc: String,
    /// Request identifier this response corresponds to.
    pub id: Option<i64>,
    /// The result on success.
    #[serde(default)]
    pub result: Option<Value>,
    /// The error on failure.
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Splits the response into the outcome delivered to the waiting caller.
    ///
    /// A missing result is treated as `null`.
    pub fn into_outcome(self) -> Result<Value, ServerFault> {
        match self.error {
            Some(error) => Err(ServerFault {
                code: error.code,
                message: error.message,
            }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional data.
    #[serde(default)]
    pub data: Option<Value>,
}

/// A request the server sends to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerRequest {
    /// Identifier to echo in the reply; numbers and strings are both legal.
    pub id: Value,
    /// Requested method.
    pub method: String,
    /// Raw parameters.
    pub params: Value,
}

/// Any message arriving from the server.
#[derive(Debug, Clone)]
pub enum JsonRpcMessage {
    /// Reply to one of our requests.
    Response(JsonRpcResponse),
    /// Server-initiated request.
    ServerRequest(ServerRequest),
    /// Server notification.
    Notification(ServerNotification),
}

impl JsonRpcMessage {
    /// Classifies a frame payload.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the payload is not a JSON-RPC
    /// message.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(bytes)?;
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .map(String::from);
        let id = value.get("id").filter(|id| !id.is_null()).cloned();
        let params = value.get("params").cloned().unwrap_or(Value::Null);

        match (method, id) {
            (Some(method), Some(id)) => Ok(Self::ServerRequest(ServerRequest { id, method, params })),
            (Some(method), None) => Ok(Self::Notification(ServerNotification { method, params })),
            (None, _) => serde_json::from_value(value).map(Self::Response),
        }
    }
}

fn non_null(params: Value) -> Option<Value> {
    if params.is_null() { None } else { Some(params) }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn encode<T: Serialize>(message: &T) -> String {
        serde_json::to_string(message).expect("serialization")
    }

    fn decode(json: &str) -> JsonRpcMessage {
        JsonRpcMessage::from_bytes(json.as_bytes()).expect("parse")
    }

    #[rstest]
    fn serialises_request_with_params() {
        let request = JsonRpcRequest::with_id(
            7,
            "workspace/executeCommand",
            json!({"command": "notedown.getConcealRanges"}),
        );
        let json = encode(&request);

        assert!(json.contains(r#""jsonrpc":"2.0""#));
        assert!(json.contains(r#""method":"workspace/executeCommand""#));
        assert!(json.contains(r#""id":7"#));
        assert!(json.contains(r#""params""#));
    }

    #[rstest]
    fn null_params_are_omitted() {
        let json = encode(&JsonRpcRequest::with_id(42, "shutdown", Value::Null));

        assert!(json.contains(r#""id":42"#));
        assert!(!json.contains("params"));
    }

    #[rstest]
    fn serialises_notification_without_id() {
        let json = encode(&JsonRpcNotification::new("initialized", json!({})));

        assert!(json.contains(r#""method":"initialized""#));
        assert!(!json.contains("id"));
    }

    #[rstest]
    fn null_result_echoes_string_ids() {
        let json = encode(&JsonRpcResult::null(json!("abc")));

        assert_eq!(json, r#"{"jsonrpc":"2.0","id":"abc","result":null}"#);
    }

    #[rstest]
    fn classifies_responses() {
        let message = decode(r#"{"jsonrpc":"2.0","id":1,"result":{"found":false}}"#);

        let JsonRpcMessage::Response(response) = message else {
            panic!("expected a response");
        };
        assert_eq!(response.id, Some(1));
        assert_eq!(response.into_outcome(), Ok(json!({"found": false})));
    }

    #[rstest]
    fn error_responses_become_faults() {
        let message =
            decode(r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32600,"message":"Invalid request"}}"#);

        let JsonRpcMessage::Response(response) = message else {
            panic!("expected a response");
        };
        assert_eq!(
            response.into_outcome(),
            Err(ServerFault {
                code: -32600,
                message: String::from("Invalid request"),
            })
        );
    }

    #[rstest]
    fn classifies_notifications() {
        let message = decode(
            r#"{"jsonrpc":"2.0","method":"window/showMessage","params":{"type":1,"message":"x"}}"#,
        );

        assert!(matches!(
            message,
            JsonRpcMessage::Notification(ServerNotification { ref method, .. })
                if method == "window/showMessage"
        ));
    }

    #[rstest]
    fn classifies_server_requests() {
        let message = decode(r#"{"jsonrpc":"2.0","id":"r1","method":"workspace/configuration"}"#);

        let JsonRpcMessage::ServerRequest(request) = message else {
            panic!("expected a server request");
        };
        assert_eq!(request.id, json!("r1"));
        assert_eq!(request.params, Value::Null);
    }

    #[rstest]
    fn request_ids_increase() {
        let first = next_request_id();
        let second = next_request_id();

        assert!(second > first);
    }
}
