//! JSON-RPC method routing.
//!
//! The dispatcher maps method names to typed handlers and turns each handler
//! outcome into either a single enveloped response or a response stream. It
//! does not parse JSON-RPC envelopes; it is given a validated request.

use std::collections::HashMap;
use std::pin::Pin;

use futures::future::BoxFuture;
use futures::{FutureExt, Stream};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::{JsonRpcError, Result};
use crate::types::{
    JsonRpcErrorResponse, JsonRpcRequest, JsonRpcSuccessResponse, RequestId,
    StreamingMessageResult,
};

/// A boxed stream of JSON-RPC result frames.
pub type ResponseStream =
    Pin<Box<dyn Stream<Item = Result<StreamingMessageResult>> + Send>>;

/// Per-dispatch data threaded into method handlers.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    /// Abort signal for the request; trips when the caller goes away.
    pub cancel: CancellationToken,
    /// Opaque per-request extension data (keyed by extension URI).
    pub extensions: HashMap<String, Value>,
}

/// What a method handler produced.
pub enum DispatchOutcome {
    /// A single result value.
    Single(Value),
    /// An asynchronous stream of result frames.
    Stream(ResponseStream),
}

/// What the dispatcher hands back to the transport.
pub enum DispatchReply {
    /// A complete JSON-RPC response object (success or error).
    Response(Value),
    /// A stream of result frames; the transport envelopes each frame with
    /// the request id.
    Stream {
        /// The id to echo on every frame.
        id: RequestId,
        /// The result frames.
        stream: ResponseStream,
    },
}

type MethodHandler = Box<
    dyn Fn(Option<Value>, DispatchContext) -> BoxFuture<'static, Result<DispatchOutcome>>
        + Send
        + Sync,
>;

/// Routes JSON-RPC method names to typed handlers.
#[derive(Default)]
pub struct Dispatcher {
    methods: HashMap<String, MethodHandler>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed handler for a method name.
    ///
    /// Params are deserialized before the handler runs; a missing or
    /// malformed params object answers `InvalidParams` without invoking it.
    pub fn register<P, F, Fut>(&mut self, method: impl Into<String>, handler: F)
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(P, DispatchContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<DispatchOutcome>> + Send + 'static,
    {
        self.methods.insert(
            method.into(),
            Box::new(move |params, ctx| {
                let parsed = match params {
                    Some(value) => serde_json::from_value::<P>(value)
                        .map_err(|e| JsonRpcError::invalid_params(e.to_string())),
                    None => Err(JsonRpcError::invalid_params("Missing params")),
                };
                match parsed {
                    Ok(params) => handler(params, ctx).boxed(),
                    Err(e) => futures::future::ready(Err(e.into())).boxed(),
                }
            }),
        );
    }

    /// Returns the registered method names.
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    /// Dispatches a validated request to its handler.
    ///
    /// Unknown methods answer `MethodNotFound`; handler failures are mapped
    /// through [`to_jsonrpc_error`](crate::error::A2AError::to_jsonrpc_error);
    /// a panicking handler answers `InternalError`.
    pub async fn dispatch(
        &self,
        request: JsonRpcRequest<Value>,
        ctx: DispatchContext,
    ) -> DispatchReply {
        let id = request.id.clone();
        let Some(handler) = self.methods.get(&request.method) else {
            debug!(method = %request.method, "Unknown method");
            return Self::error_reply(id, JsonRpcError::method_not_found(&request.method));
        };

        let outcome = std::panic::AssertUnwindSafe(handler(request.params, ctx))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(DispatchOutcome::Single(result))) => {
                let response = JsonRpcSuccessResponse::new(Some(id), result);
                match serde_json::to_value(&response) {
                    Ok(value) => DispatchReply::Response(value),
                    Err(e) => Self::error_reply(
                        response.id.unwrap_or_default(),
                        JsonRpcError::internal_error(e.to_string()),
                    ),
                }
            }
            Ok(Ok(DispatchOutcome::Stream(stream))) => DispatchReply::Stream { id, stream },
            Ok(Err(e)) => Self::error_reply(id, e.to_jsonrpc_error()),
            Err(panic) => {
                error!(method = %request.method, "Handler panicked");
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                Self::error_reply(id, JsonRpcError::internal_error(detail))
            }
        }
    }

    fn error_reply(id: RequestId, error: JsonRpcError) -> DispatchReply {
        let response = JsonRpcErrorResponse::new(Some(id), error);
        DispatchReply::Response(
            serde_json::to_value(&response).unwrap_or_else(|_| Value::Null),
        )
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("methods", &self.method_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskIdParams;

    fn request(method: &str, params: Value) -> JsonRpcRequest<Value> {
        JsonRpcRequest::with_id(1, method, params)
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let dispatcher = Dispatcher::new();
        let reply = dispatcher
            .dispatch(request("nope", Value::Null), DispatchContext::default())
            .await;
        match reply {
            DispatchReply::Response(v) => {
                assert_eq!(v["error"]["code"], -32601);
                assert_eq!(v["id"], 1);
            }
            DispatchReply::Stream { .. } => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn test_single_response() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("tasks/echo", |params: TaskIdParams, _ctx| async move {
            Ok(DispatchOutcome::Single(Value::String(params.id)))
        });

        let reply = dispatcher
            .dispatch(
                request("tasks/echo", serde_json::json!({"id": "t1"})),
                DispatchContext::default(),
            )
            .await;
        match reply {
            DispatchReply::Response(v) => {
                assert_eq!(v["result"], "t1");
                assert_eq!(v["jsonrpc"], "2.0");
            }
            DispatchReply::Stream { .. } => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("tasks/echo", |params: TaskIdParams, _ctx| async move {
            Ok(DispatchOutcome::Single(Value::String(params.id)))
        });

        let reply = dispatcher
            .dispatch(
                request("tasks/echo", serde_json::json!({"wrong": true})),
                DispatchContext::default(),
            )
            .await;
        match reply {
            DispatchReply::Response(v) => assert_eq!(v["error"]["code"], -32602),
            DispatchReply::Stream { .. } => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn test_handler_error_is_enveloped() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("tasks/fail", |params: TaskIdParams, _ctx| async move {
            Err(JsonRpcError::task_not_found(&params.id).into())
        });

        let reply = dispatcher
            .dispatch(
                request("tasks/fail", serde_json::json!({"id": "t1"})),
                DispatchContext::default(),
            )
            .await;
        match reply {
            DispatchReply::Response(v) => assert_eq!(v["error"]["code"], -32001),
            DispatchReply::Stream { .. } => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn test_handler_panic_is_internal_error() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("tasks/panic", |_params: TaskIdParams, _ctx| async move {
            if true {
                panic!("boom");
            }
            Ok(DispatchOutcome::Single(Value::Null))
        });

        let reply = dispatcher
            .dispatch(
                request("tasks/panic", serde_json::json!({"id": "t1"})),
                DispatchContext::default(),
            )
            .await;
        match reply {
            DispatchReply::Response(v) => {
                assert_eq!(v["error"]["code"], -32603);
            }
            DispatchReply::Stream { .. } => panic!("expected a response"),
        }
    }
}
