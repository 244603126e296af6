//! A2A server runtime.
//!
//! The runtime owns the JSON-RPC surface, the task lifecycle, and per-task
//! event fan-out; agent business logic plugs in through the single
//! [`AgentExecutor`] extension point.
//!
//! # Components
//!
//! - **HTTP application**: Axum-based, JSON-RPC over `POST /a2a` with SSE
//!   streaming, agent descriptor on the well-known path
//! - **Dispatcher**: method-name routing to typed handlers
//! - **Execution context / task stream**: the producer API agents use
//! - **Stream consumer/manager**: per-task fan-out with live-only tapping
//! - **Task store / event queue**: pluggable persistence and buffering

mod app;
mod consumer;
mod context;
mod dispatcher;
mod events;
mod handlers;
mod store;
mod stream;

pub use app::*;
pub use consumer::*;
pub use context::*;
pub use dispatcher::*;
pub use events::*;
pub use handlers::*;
pub use store::*;
pub use stream::*;

use async_trait::async_trait;

use crate::error::{JsonRpcError, Result};
use crate::types::{AgentCard, Message, Task};

/// What the agent produced for a request.
#[derive(Debug)]
pub enum AgentResponse {
    /// A direct message; no task involved.
    Message(Message),
    /// A finished or pending task value.
    Task(Task),
    /// A live stream: initial task plus the queue its producer writes to.
    Stream(StreamHandle),
}

impl From<Message> for AgentResponse {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

impl From<Task> for AgentResponse {
    fn from(task: Task) -> Self {
        Self::Task(task)
    }
}

impl From<StreamHandle> for AgentResponse {
    fn from(handle: StreamHandle) -> Self {
        Self::Stream(handle)
    }
}

/// The agent business-logic extension point.
///
/// Implement this trait to define how your agent answers messages. The
/// executor produces its result through the [`ExecutionContext`]'s producer
/// operations; everything else (dispatch, persistence, fan-out) is owned by
/// the runtime.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Processes an incoming message.
    async fn execute(&self, ctx: std::sync::Arc<ExecutionContext>) -> Result<AgentResponse>;

    /// Cancels an ongoing task, returning the updated task.
    ///
    /// The default declines: most agents cannot interrupt work in flight.
    async fn cancel(&self, task: Task) -> Result<Task> {
        Err(JsonRpcError::task_not_cancelable(&task.id).into())
    }

    /// Returns the agent card describing this agent's capabilities.
    fn agent_card(&self) -> &AgentCard;
}
