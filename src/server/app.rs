//! Axum-based HTTP application for the A2A runtime.
//!
//! Two endpoints: `POST /a2a` carries every JSON-RPC method (answering with
//! a single JSON object or a `text/event-stream` of JSON-RPC frames, method
//! depending), and `GET /.well-known/agent.json` serves the agent descriptor.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::JsonRpcError;
use crate::types::{AgentCard, JsonRpcErrorResponse, JsonRpcRequest, JSONRPC_VERSION};

use super::dispatcher::{DispatchContext, DispatchReply, Dispatcher};
use super::handlers::DefaultRequestHandler;
use super::AgentExecutor;

/// Request header carrying activated extension URIs, comma-separated.
pub const EXTENSIONS_HEADER: &str = "X-A2A-Extensions";

/// Configuration for the A2A server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Enable CORS for all origins.
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    /// Creates a new server configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enables or disables CORS.
    #[must_use]
    pub const fn cors(mut self, enabled: bool) -> Self {
        self.enable_cors = enabled;
        self
    }

    /// Returns the bind address.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Server state shared across requests: the dispatcher all methods route
/// through, plus the agent card for the well-known endpoint.
#[derive(Clone)]
pub struct ServerState {
    /// The dispatcher all JSON-RPC methods route through.
    pub dispatcher: Arc<Dispatcher>,
    /// The agent card served on the well-known endpoint.
    pub agent_card: Arc<AgentCard>,
}

impl ServerState {
    /// Creates server state from a dispatcher and agent card.
    pub fn new(dispatcher: Dispatcher, agent_card: AgentCard) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            agent_card: Arc::new(agent_card),
        }
    }

    /// Convenience constructor: wraps an [`AgentExecutor`] in a
    /// [`DefaultRequestHandler`] and registers every A2A method.
    pub fn from_executor<E: AgentExecutor + 'static>(executor: E) -> Self {
        let card = executor.agent_card().clone();
        let handler = DefaultRequestHandler::new(executor);
        Self::new(handler.dispatcher(), card)
    }
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("agent_card", &self.agent_card)
            .finish_non_exhaustive()
    }
}

/// A2A server application wrapping an Axum router.
pub struct A2AServer {
    router: Router,
    config: ServerConfig,
}

impl A2AServer {
    /// Creates a new A2A server from an [`AgentExecutor`].
    pub fn new(executor: impl AgentExecutor + 'static) -> Self {
        Self::with_config(executor, ServerConfig::default())
    }

    /// Creates a new A2A server with custom configuration.
    pub fn with_config(executor: impl AgentExecutor + 'static, config: ServerConfig) -> Self {
        Self::from_state(ServerState::from_executor(executor), config)
    }

    /// Creates a server from a pre-built [`ServerState`] (custom dispatcher).
    #[must_use]
    pub fn from_state(state: ServerState, config: ServerConfig) -> Self {
        let router = Self::build_router(state, &config);
        Self { router, config }
    }

    fn build_router(state: ServerState, config: &ServerConfig) -> Router {
        let mut router = Router::new()
            .route("/.well-known/agent.json", get(handle_agent_card))
            .route("/a2a", post(handle_rpc))
            .route("/health", get(handle_health))
            .with_state(state);

        if config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
            router = router.layer(cors);
        }

        router
    }

    /// Returns the Axum router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Starts the server and listens for incoming connections.
    pub async fn serve(self) -> Result<(), std::io::Error> {
        let addr = self.config.bind_address();
        info!("Starting A2A server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, self.router).await
    }

    /// Starts the server with graceful shutdown support.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<(), std::io::Error>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_address();
        info!("Starting A2A server on {} (with graceful shutdown)", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal)
            .await
    }
}

/// Handler for the agent descriptor endpoint.
async fn handle_agent_card(State(state): State<ServerState>) -> Json<AgentCard> {
    Json((*state.agent_card).clone())
}

/// Handler for the health check endpoint.
async fn handle_health() -> &'static str {
    "OK"
}

/// Handler for the combined JSON-RPC endpoint.
///
/// Single-response methods answer one JSON object; streaming methods answer
/// `text/event-stream`, one JSON-RPC response per `data:` frame.
async fn handle_rpc(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let request: JsonRpcRequest<serde_json::Value> = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(_) => {
            return json_response(&JsonRpcErrorResponse::new(None, JsonRpcError::parse_error()));
        }
    };
    if request.jsonrpc != JSONRPC_VERSION {
        return json_response(&JsonRpcErrorResponse::new(
            Some(request.id),
            JsonRpcError::invalid_request("jsonrpc version must be \"2.0\""),
        ));
    }

    let ctx = DispatchContext {
        cancel: CancellationToken::new(),
        extensions: parse_extensions(&headers),
    };

    match state.dispatcher.dispatch(request, ctx).await {
        DispatchReply::Response(value) => json_response(&value),
        DispatchReply::Stream { id, stream } => {
            use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};

            let sse_stream = stream.map(move |item| {
                let frame = match item {
                    Ok(result) => serde_json::json!({
                        "jsonrpc": JSONRPC_VERSION,
                        "id": id,
                        "result": result,
                    }),
                    Err(e) => {
                        let rpc_err = e.to_jsonrpc_error();
                        serde_json::json!({
                            "jsonrpc": JSONRPC_VERSION,
                            "id": id,
                            "error": { "code": rpc_err.code, "message": rpc_err.message },
                        })
                    }
                };
                Ok::<_, std::convert::Infallible>(SseEvent::default().data(frame.to_string()))
            });

            Sse::new(sse_stream)
                .keep_alive(KeepAlive::default())
                .into_response()
        }
    }
}

/// Reads the extensions header into the opaque per-request map.
fn parse_extensions(headers: &HeaderMap) -> HashMap<String, serde_json::Value> {
    headers
        .get(EXTENSIONS_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|uri| !uri.is_empty())
                .map(|uri| (uri.to_string(), serde_json::Value::Bool(true)))
                .collect()
        })
        .unwrap_or_default()
}

fn json_response<T: serde::Serialize>(value: &T) -> Response {
    let body = serde_json::to_string(value).unwrap_or_else(|_| {
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#
            .to_string()
    });
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::new().host("127.0.0.1").port(3000).cors(false);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert!(!config.enable_cors);
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_parse_extensions_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            EXTENSIONS_HEADER,
            "urn:a2a:ext:one, urn:a2a:ext:two".parse().unwrap(),
        );
        let extensions = parse_extensions(&headers);
        assert_eq!(extensions.len(), 2);
        assert!(extensions.contains_key("urn:a2a:ext:one"));
        assert!(extensions.contains_key("urn:a2a:ext:two"));

        assert!(parse_extensions(&HeaderMap::new()).is_empty());
    }
}
