//! Error types for the A2A runtime.
//!
//! This module defines the error types used throughout the crate, following
//! the JSON-RPC 2.0 error specification and the A2A-specific error codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A specialized Result type for A2A operations.
pub type Result<T> = std::result::Result<T, A2AError>;

/// The main error type for the A2A runtime.
#[derive(Error, Debug)]
pub enum A2AError {
    /// JSON-RPC protocol errors
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[cfg(feature = "client")]
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Stream errors (closed producer handles, broken SSE framing)
    #[error("Stream error: {0}")]
    Stream(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl A2AError {
    /// Extracts the JSON-RPC error code if this is a JSON-RPC error.
    pub fn jsonrpc_code(&self) -> Option<i32> {
        match self {
            Self::JsonRpc(e) => Some(e.code),
            _ => None,
        }
    }

    /// Converts this error into a JSON-RPC error object.
    ///
    /// Errors that already carry the JSON-RPC shape pass through verbatim;
    /// anything else is wrapped in `InternalError`.
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        match self {
            Self::JsonRpc(e) => e.clone(),
            other => JsonRpcError::internal_error(other.to_string()),
        }
    }
}

/// JSON-RPC 2.0 error codes used by the A2A protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum JsonRpcErrorCode {
    /// Invalid JSON was received by the server.
    ParseError = -32700,
    /// The JSON sent is not a valid Request object.
    InvalidRequest = -32600,
    /// The method does not exist / is not available.
    MethodNotFound = -32601,
    /// Invalid method parameter(s).
    InvalidParams = -32602,
    /// Internal JSON-RPC error.
    InternalError = -32603,

    // A2A-specific error codes
    /// Task not found.
    TaskNotFound = -32001,
    /// Task cannot be canceled.
    TaskNotCancelable = -32002,
    /// Push notification not supported.
    PushNotificationNotSupported = -32003,
    /// Operation not supported.
    UnsupportedOperation = -32004,
    /// Content type not supported.
    ContentTypeNotSupported = -32005,
    /// Invalid agent response.
    InvalidAgentResponse = -32006,
}

impl JsonRpcErrorCode {
    /// Returns the default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ParseError => "Invalid JSON payload",
            Self::InvalidRequest => "Request payload validation error",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid parameters",
            Self::InternalError => "Internal error",
            Self::TaskNotFound => "Task not found",
            Self::TaskNotCancelable => "Task cannot be canceled",
            Self::PushNotificationNotSupported => "Push Notification is not supported",
            Self::UnsupportedOperation => "This operation is not supported",
            Self::ContentTypeNotSupported => "Incompatible content types",
            Self::InvalidAgentResponse => "Invalid agent response",
        }
    }
}

impl From<i32> for JsonRpcErrorCode {
    fn from(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32001 => Self::TaskNotFound,
            -32002 => Self::TaskNotCancelable,
            -32003 => Self::PushNotificationNotSupported,
            -32004 => Self::UnsupportedOperation,
            -32005 => Self::ContentTypeNotSupported,
            -32006 => Self::InvalidAgentResponse,
            _ => Self::InternalError,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub struct JsonRpcError {
    /// A number indicating the error type.
    pub code: i32,
    /// A short description of the error.
    pub message: String,
    /// Additional information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl JsonRpcError {
    /// Creates a new JSON-RPC error.
    pub fn new(code: JsonRpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a new JSON-RPC error with additional data.
    pub fn with_data(
        code: JsonRpcErrorCode,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Creates a parse error.
    pub fn parse_error() -> Self {
        Self::new(
            JsonRpcErrorCode::ParseError,
            JsonRpcErrorCode::ParseError.default_message(),
        )
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidRequest, message)
    }

    /// Creates a method not found error.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::MethodNotFound,
            format!("Method '{}' not found", method),
        )
    }

    /// Creates an invalid params error.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidParams, message)
    }

    /// Creates an internal error.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(JsonRpcErrorCode::InternalError, message)
    }

    /// Creates a task not found error.
    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::TaskNotFound,
            format!("Task '{}' not found", task_id),
        )
    }

    /// Creates a task not cancelable error.
    pub fn task_not_cancelable(task_id: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::TaskNotCancelable,
            format!("Task '{}' cannot be canceled", task_id),
        )
    }

    /// Creates a push notification not supported error.
    pub fn push_notification_not_supported() -> Self {
        Self::new(
            JsonRpcErrorCode::PushNotificationNotSupported,
            JsonRpcErrorCode::PushNotificationNotSupported.default_message(),
        )
    }

    /// Creates an unsupported operation error.
    pub fn unsupported_operation(operation: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::UnsupportedOperation,
            format!("Operation '{}' is not supported", operation),
        )
    }

    /// Creates an invalid agent response error.
    pub fn invalid_agent_response(message: impl Into<String>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidAgentResponse, message)
    }

    /// Returns the error code as an enum variant.
    pub fn error_code(&self) -> JsonRpcErrorCode {
        JsonRpcErrorCode::from(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(JsonRpcErrorCode::from(-32700), JsonRpcErrorCode::ParseError);
        assert_eq!(
            JsonRpcErrorCode::from(-32001),
            JsonRpcErrorCode::TaskNotFound
        );
        assert_eq!(
            JsonRpcErrorCode::from(-32006),
            JsonRpcErrorCode::InvalidAgentResponse
        );
    }

    #[test]
    fn test_json_rpc_error_serialization() {
        let error = JsonRpcError::task_not_found("test-123");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("-32001"));
        assert!(json.contains("test-123"));
    }

    #[test]
    fn test_to_jsonrpc_error_passthrough() {
        let err = A2AError::from(JsonRpcError::task_not_cancelable("t1"));
        assert_eq!(err.to_jsonrpc_error().code, -32002);

        let err = A2AError::Internal("boom".into());
        let rpc = err.to_jsonrpc_error();
        assert_eq!(rpc.code, JsonRpcErrorCode::InternalError as i32);
        assert!(rpc.message.contains("boom"));
    }
}
