//! Request handlers for the A2A JSON-RPC methods.
//!
//! [`DefaultRequestHandler`] coordinates the [`AgentExecutor`], the
//! [`TaskStore`], and the [`StreamManager`]: it resolves referenced tasks,
//! invokes the agent, persists resulting tasks, and wires streaming
//! responses through the per-task consumer.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{A2AError, JsonRpcError, JsonRpcErrorCode, Result};
use crate::types::{
    MessageSendParams, SendMessageResult, StreamingMessageResult, Task, TaskIdParams,
    TaskPushNotificationConfig, TaskQueryParams,
};

use super::consumer::{EventStream, StreamManager};
use super::context::{AgentRequest, ExecutionContext, StreamHandle};
use super::dispatcher::{DispatchContext, DispatchOutcome, Dispatcher, ResponseStream};
use super::events::StreamEvent;
use super::store::{InMemoryTaskStore, TaskStore};
use super::{AgentExecutor, AgentResponse};

/// Default request handler for all incoming A2A requests.
pub struct DefaultRequestHandler<E: AgentExecutor> {
    executor: Arc<E>,
    store: Arc<dyn TaskStore>,
    streams: Arc<StreamManager>,
}

impl<E: AgentExecutor> Clone for DefaultRequestHandler<E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            store: Arc::clone(&self.store),
            streams: Arc::clone(&self.streams),
        }
    }
}

impl<E: AgentExecutor + 'static> DefaultRequestHandler<E> {
    /// Creates a handler backed by an in-memory task store.
    pub fn new(executor: E) -> Self {
        Self::with_store(executor, Arc::new(InMemoryTaskStore::new()))
    }

    /// Creates a handler with a custom task store.
    pub fn with_store(executor: E, store: Arc<dyn TaskStore>) -> Self {
        Self {
            executor: Arc::new(executor),
            store,
            streams: Arc::new(StreamManager::new()),
        }
    }

    /// Returns the agent card.
    pub fn agent_card(&self) -> &crate::types::AgentCard {
        self.executor.agent_card()
    }

    /// Returns the task store.
    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Builds a dispatcher with every A2A method registered against this
    /// handler.
    pub fn dispatcher(&self) -> Dispatcher {
        let mut dispatcher = Dispatcher::new();

        let h = self.clone();
        dispatcher.register(
            "message/send",
            move |params: MessageSendParams, ctx: DispatchContext| {
                let h = h.clone();
                async move {
                    let result = h.on_message_send(params, ctx.extensions).await?;
                    Ok(DispatchOutcome::Single(serde_json::to_value(result)?))
                }
            },
        );

        let h = self.clone();
        dispatcher.register(
            "message/stream",
            move |params: MessageSendParams, ctx: DispatchContext| {
                let h = h.clone();
                async move {
                    let stream = h.on_message_stream(params, ctx.cancel, ctx.extensions).await?;
                    Ok(DispatchOutcome::Stream(stream))
                }
            },
        );

        let h = self.clone();
        dispatcher.register(
            "tasks/get",
            move |params: TaskQueryParams, _ctx: DispatchContext| {
                let h = h.clone();
                async move {
                    let task = h.on_get_task(params).await?;
                    Ok(DispatchOutcome::Single(serde_json::to_value(task)?))
                }
            },
        );

        let h = self.clone();
        dispatcher.register(
            "tasks/cancel",
            move |params: TaskIdParams, _ctx: DispatchContext| {
                let h = h.clone();
                async move {
                    let task = h.on_cancel_task(params).await?;
                    Ok(DispatchOutcome::Single(serde_json::to_value(task)?))
                }
            },
        );

        let h = self.clone();
        dispatcher.register(
            "tasks/resubscribe",
            move |params: TaskIdParams, _ctx: DispatchContext| {
                let h = h.clone();
                async move {
                    let stream = h.on_resubscribe(params).await?;
                    Ok(DispatchOutcome::Stream(stream))
                }
            },
        );

        let h = self.clone();
        dispatcher.register(
            "tasks/pushNotificationConfig/set",
            move |params: TaskPushNotificationConfig, _ctx: DispatchContext| {
                let h = h.clone();
                async move {
                    let config = h.on_set_push_notification_config(params).await?;
                    Ok(DispatchOutcome::Single(serde_json::to_value(config)?))
                }
            },
        );

        let h = self.clone();
        dispatcher.register(
            "tasks/pushNotificationConfig/get",
            move |params: TaskIdParams, _ctx: DispatchContext| {
                let h = h.clone();
                async move {
                    let config = h.on_get_push_notification_config(params).await?;
                    Ok(DispatchOutcome::Single(serde_json::to_value(config)?))
                }
            },
        );

        dispatcher
    }

    /// Handles `message/send`: invokes the agent and answers with a single
    /// Task or Message.
    pub async fn on_message_send(
        &self,
        params: MessageSendParams,
        extensions: HashMap<String, Value>,
    ) -> Result<SendMessageResult> {
        let history_length = history_limit(&params);
        let ctx = self.build_context(params, extensions).await?;

        match self.run_executor(&ctx).await? {
            AgentResponse::Message(message) => Ok(SendMessageResult::Message(message)),
            AgentResponse::Task(mut task) => {
                self.store.save(&task, None).await?;
                task.truncate_history(history_length);
                info!(task_id = %task.id, state = ?task.status.state, "Message send completed");
                Ok(SendMessageResult::Task(task))
            }
            AgentResponse::Stream(handle) => {
                self.verify_stream_handle(&ctx, &handle)?;
                self.store.save(&handle.task, None).await?;

                // With no tapper the events still need a consumer so the
                // sentinel is reached and cleanup happens.
                if self.streams.get(&handle.task.id).is_none() {
                    let consumer = self.streams.create_consumer(
                        &handle.task.id,
                        Arc::clone(&handle.queue),
                        CancellationToken::new(),
                    )?;
                    self.spawn_background_drain(consumer.consume(), Arc::clone(&ctx));
                }
                info!(task_id = %handle.task.id, "Message send answered with initial task; producer streams in background");
                Ok(SendMessageResult::Task(handle.task))
            }
        }
    }

    /// Handles `message/stream`: answers with a response stream whose first
    /// frame is the initial Task, followed by the task's events.
    pub async fn on_message_stream(
        &self,
        params: MessageSendParams,
        cancel: CancellationToken,
        extensions: HashMap<String, Value>,
    ) -> Result<ResponseStream> {
        let ctx = self.build_context(params, extensions).await?;

        match self.run_executor(&ctx).await? {
            AgentResponse::Message(message) => {
                Ok(single_frame(StreamingMessageResult::Message(message)))
            }
            AgentResponse::Task(task) => {
                self.store.save(&task, None).await?;
                Ok(single_frame(StreamingMessageResult::Task(task)))
            }
            AgentResponse::Stream(handle) => {
                self.verify_stream_handle(&ctx, &handle)?;
                self.store.save(&handle.task, None).await?;

                let initial = handle.task.clone();
                let mut events = self.streams.tap_or_consume(
                    &initial.id,
                    Arc::clone(&handle.queue),
                    cancel,
                );
                let store = Arc::clone(&self.store);
                let ctx = Arc::clone(&ctx);

                info!(task_id = %initial.id, "Started streaming response");
                let stream = async_stream::stream! {
                    yield Ok(StreamingMessageResult::Task(initial));
                    while let Some(event) = events.next().await {
                        persist_on_close(&store, &ctx, &event).await;
                        if let Some(frame) = event.into_result() {
                            yield Ok(frame);
                        }
                    }
                };
                Ok(Box::pin(stream))
            }
        }
    }

    /// Handles `tasks/get`.
    pub async fn on_get_task(&self, params: TaskQueryParams) -> Result<Task> {
        let mut task = self
            .store
            .get(&params.id)
            .await?
            .ok_or_else(|| JsonRpcError::task_not_found(&params.id))?;
        task.truncate_history(params.history_length.map(|n| n.max(0) as usize));
        Ok(task)
    }

    /// Handles `tasks/cancel`: delegates to the executor and persists its
    /// updated task.
    pub async fn on_cancel_task(&self, params: TaskIdParams) -> Result<Task> {
        let task = self
            .store
            .get(&params.id)
            .await?
            .ok_or_else(|| JsonRpcError::task_not_found(&params.id))?;

        let updated = self.executor.cancel(task).await?;
        self.store.save(&updated, None).await?;
        info!(task_id = %updated.id, state = ?updated.status.state, "Cancel handled");
        Ok(updated)
    }

    /// Handles `tasks/resubscribe`: taps the task's active consumer.
    ///
    /// Late subscribers see only events processed after they subscribed; a
    /// task whose consumer has already finished is gone (no replay).
    pub async fn on_resubscribe(&self, params: TaskIdParams) -> Result<ResponseStream> {
        let consumer = self.streams.get(&params.id).filter(|c| c.is_active());
        let Some(consumer) = consumer else {
            // Distinguish a finished task from an unknown one in the message.
            let error = if self.store.get(&params.id).await?.is_some() {
                JsonRpcError::new(
                    JsonRpcErrorCode::TaskNotFound,
                    format!("Task '{}' is not active", params.id),
                )
            } else {
                JsonRpcError::task_not_found(&params.id)
            };
            return Err(error.into());
        };

        let mut events = consumer.tap();
        info!(task_id = %params.id, "Resubscribed to task");
        let stream = async_stream::stream! {
            while let Some(event) = events.next().await {
                if let Some(frame) = event.into_result() {
                    yield Ok(frame);
                }
            }
        };
        Ok(Box::pin(stream))
    }

    /// Handles `tasks/pushNotificationConfig/set`: echoes the config with
    /// credentials omitted. Stub contract; no delivery happens.
    pub async fn on_set_push_notification_config(
        &self,
        params: TaskPushNotificationConfig,
    ) -> Result<TaskPushNotificationConfig> {
        self.store
            .get(&params.task_id)
            .await?
            .ok_or_else(|| JsonRpcError::task_not_found(&params.task_id))?;
        Ok(params.masked())
    }

    /// Handles `tasks/pushNotificationConfig/get`. Stub contract: always
    /// answers `PushNotificationNotSupported`.
    pub async fn on_get_push_notification_config(
        &self,
        params: TaskIdParams,
    ) -> Result<TaskPushNotificationConfig> {
        self.store
            .get(&params.id)
            .await?
            .ok_or_else(|| JsonRpcError::task_not_found(&params.id))?;
        Err(JsonRpcError::push_notification_not_supported().into())
    }

    /// Resolves the referenced tasks and builds the execution context.
    async fn build_context(
        &self,
        params: MessageSendParams,
        extensions: HashMap<String, Value>,
    ) -> Result<Arc<ExecutionContext>> {
        let message = params.message.clone();
        if message.message_id.is_empty() {
            return Err(JsonRpcError::invalid_params("Message id is required").into());
        }
        if message.parts.is_empty() {
            return Err(JsonRpcError::invalid_params("Message parts are required").into());
        }

        let current_task = match &message.task_id {
            Some(task_id) => {
                let task = self
                    .store
                    .get(task_id)
                    .await?
                    .ok_or_else(|| JsonRpcError::task_not_found(task_id))?;
                if task.is_terminal() {
                    return Err(JsonRpcError::invalid_params(format!(
                        "Task '{}' is already in terminal state {:?}",
                        task_id, task.status.state
                    ))
                    .into());
                }
                Some(task)
            }
            None => None,
        };

        let mut reference_tasks = Vec::new();
        if let Some(ids) = &message.reference_task_ids {
            for id in ids {
                // Missing references are silently elided.
                match self.store.get(id).await? {
                    Some(task) => reference_tasks.push(task),
                    None => debug!(task_id = %id, "Referenced task not found; elided"),
                }
            }
        }

        let request = AgentRequest { params, extensions };
        Ok(ExecutionContext::new(
            request,
            current_task,
            reference_tasks,
            None,
        ))
    }

    /// Runs the agent executor, wrapping non-protocol failures in
    /// `InvalidAgentResponse`.
    async fn run_executor(&self, ctx: &Arc<ExecutionContext>) -> Result<AgentResponse> {
        match self.executor.execute(Arc::clone(ctx)).await {
            Ok(response) => Ok(response),
            Err(e @ A2AError::JsonRpc(_)) => Err(e),
            Err(other) => Err(JsonRpcError::invalid_agent_response(other.to_string()).into()),
        }
    }

    /// Validates that a stream handle belongs to this request's task.
    fn verify_stream_handle(
        &self,
        ctx: &Arc<ExecutionContext>,
        handle: &StreamHandle,
    ) -> Result<()> {
        let current = ctx.current_task().ok_or_else(|| {
            A2AError::from(JsonRpcError::invalid_agent_response(
                "Stream result without a current task",
            ))
        })?;
        if handle.task.id != current.id || handle.task.context_id != ctx.context_id() {
            return Err(JsonRpcError::invalid_agent_response(format!(
                "Stream task '{}' does not match request task '{}'",
                handle.task.id, current.id
            ))
            .into());
        }
        Ok(())
    }

    /// Drains a consumer in the background, persisting closing snapshots.
    fn spawn_background_drain(&self, mut events: EventStream, ctx: Arc<ExecutionContext>) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                persist_on_close(&store, &ctx, &event).await;
            }
        });
    }
}

/// Saves the context's task snapshot when an event closes the stream
/// (terminal or pending status).
async fn persist_on_close(
    store: &Arc<dyn TaskStore>,
    ctx: &Arc<ExecutionContext>,
    event: &StreamEvent,
) {
    if let StreamEvent::StatusUpdate(update) = event {
        if update.status.state.closes_stream() {
            if let Some(task) = ctx.current_task() {
                if let Err(e) = store.save(&task, None).await {
                    warn!(task_id = %task.id, error = %e, "Failed to persist task snapshot");
                }
            }
        }
    }
}

fn single_frame(frame: StreamingMessageResult) -> ResponseStream {
    Box::pin(futures::stream::once(async move { Ok(frame) }))
}

fn history_limit(params: &MessageSendParams) -> Option<usize> {
    params
        .configuration
        .as_ref()
        .and_then(|c| c.history_length)
        .map(|n| n.max(0) as usize)
}
