//! # A2A Runtime
//!
//! A server-side runtime for the `Agent2Agent` (A2A) protocol: a JSON-RPC 2.0
//! surface over HTTP with Server-Sent Events, a task lifecycle state machine,
//! and per-task event fan-out with live-only late subscription.
//!
//! Agent business logic plugs in through one extension point,
//! [`AgentExecutor`](server::AgentExecutor); the runtime owns everything
//! else: dispatch, validation, task persistence, and stream coordination.
//!
//! ## Features
//!
//! - **`server`** (default): the Axum application, dispatcher, handlers, and
//!   the task-stream coordination layer
//! - **`client`** (default): a JSON-RPC client with SSE stream consumption

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod error;
pub mod types;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types at the crate root.
#[cfg(feature = "client")]
pub use client::{A2AClient, ClientEventStream};
pub use error::{A2AError, JsonRpcError, JsonRpcErrorCode, Result};
#[cfg(feature = "server")]
pub use server::{
    A2AServer, AgentExecutor, AgentRequest, AgentResponse, DefaultRequestHandler,
    DispatchContext, DispatchOutcome, DispatchReply, Dispatcher, EventQueue, ExecutionContext,
    InMemoryEventQueue, InMemoryTaskStore, ServerConfig, ServerState, StreamConsumer,
    StreamEvent, StreamHandle, StreamManager, TaskStore, TaskStream, TaskUpdate,
};
pub use types::{
    AgentCapabilities, AgentCard, AgentSkill, Artifact, ArtifactBuilder, JsonRpcErrorResponse,
    JsonRpcRequest, JsonRpcResponse, JsonRpcSuccessResponse, Message, MessageBuilder,
    MessageSendParams, Part, PushNotificationConfig, RequestId, Role, SendMessageResult,
    StreamingMessageResult, Task, TaskBuilder, TaskIdParams, TaskPushNotificationConfig,
    TaskQueryParams, TaskState, TaskStatus,
};

/// Protocol version supported by this runtime.
pub const PROTOCOL_VERSION: &str = "0.3.0";

/// Well-known path for the public agent descriptor.
pub const WELL_KNOWN_AGENT_PATH: &str = "/.well-known/agent.json";
