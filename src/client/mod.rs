//! A2A client: JSON-RPC over HTTP with SSE streaming consumption.

mod sse;

pub use sse::*;

use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};

use futures::{Stream, StreamExt, TryStreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{A2AError, Result};
use crate::types::{
    AgentCard, JsonRpcRequest, JsonRpcResponse, MessageSendParams, RequestId, SendMessageResult,
    StreamingMessageResult, Task, TaskIdParams, TaskPushNotificationConfig, TaskQueryParams,
};

/// Numeric request ids wrap at this bound.
const REQUEST_ID_BOUND: i64 = 1 << 31;

/// A boxed stream of decoded streaming result frames.
pub type ClientEventStream =
    Pin<Box<dyn Stream<Item = Result<StreamingMessageResult>> + Send>>;

/// A JSON-RPC client for A2A agents.
pub struct A2AClient {
    http: reqwest::Client,
    endpoint: Url,
    next_id: AtomicI64,
}

impl A2AClient {
    /// Creates a client for the given JSON-RPC endpoint
    /// (e.g. `http://localhost:8080/a2a`).
    pub fn new(endpoint: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: Url::parse(endpoint.as_ref())?,
            next_id: AtomicI64::new(1),
        })
    }

    /// Creates a client with a custom `reqwest` client.
    pub fn with_http_client(endpoint: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        Ok(Self {
            http,
            endpoint: Url::parse(endpoint.as_ref())?,
            next_id: AtomicI64::new(1),
        })
    }

    /// Fetches the agent descriptor from the well-known path.
    pub async fn fetch_agent_card(&self) -> Result<AgentCard> {
        let url = self.endpoint.join(crate::WELL_KNOWN_AGENT_PATH)?;
        let card = self.http.get(url).send().await?.json().await?;
        Ok(card)
    }

    /// Sends a message and waits for the single Task or Message response.
    pub async fn send_message(&self, params: MessageSendParams) -> Result<SendMessageResult> {
        self.call("message/send", params).await
    }

    /// Sends a message and consumes the response as an event stream.
    pub async fn stream_message(&self, params: MessageSendParams) -> Result<ClientEventStream> {
        self.stream_call("message/stream", params).await
    }

    /// Fetches a task by id.
    pub async fn get_task(&self, params: TaskQueryParams) -> Result<Task> {
        self.call("tasks/get", params).await
    }

    /// Requests cancellation of a task.
    pub async fn cancel_task(&self, params: TaskIdParams) -> Result<Task> {
        self.call("tasks/cancel", params).await
    }

    /// Reconnects to an active task's event stream.
    pub async fn resubscribe(&self, params: TaskIdParams) -> Result<ClientEventStream> {
        self.stream_call("tasks/resubscribe", params).await
    }

    /// Registers a push notification config; the server echoes it with
    /// credentials masked.
    pub async fn set_push_notification_config(
        &self,
        params: TaskPushNotificationConfig,
    ) -> Result<TaskPushNotificationConfig> {
        self.call("tasks/pushNotificationConfig/set", params).await
    }

    fn next_request_id(&self) -> RequestId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) % REQUEST_ID_BOUND;
        RequestId::Number(id)
    }

    async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<R> {
        let request = JsonRpcRequest::with_id(self.next_request_id(), method, params);
        debug!(method = %method, "Sending JSON-RPC request");

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;
        let envelope: JsonRpcResponse = response.json().await?;

        if let Some(error) = envelope.error {
            return Err(error.into());
        }
        let result = envelope
            .result
            .ok_or_else(|| A2AError::Internal("Response carries neither result nor error".into()))?;
        Ok(serde_json::from_value(result)?)
    }

    async fn stream_call<P: Serialize>(
        &self,
        method: &str,
        params: P,
    ) -> Result<ClientEventStream> {
        let request = JsonRpcRequest::with_id(self.next_request_id(), method, params);
        debug!(method = %method, "Opening streaming JSON-RPC request");

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        // A non-streaming answer means the setup failed; surface its error.
        if !content_type.starts_with("text/event-stream") {
            let envelope: JsonRpcResponse = response.json().await?;
            return match envelope.error {
                Some(error) => Err(error.into()),
                None => Err(A2AError::Stream(format!(
                    "Expected text/event-stream, got '{content_type}'"
                ))),
            };
        }

        let chunks = response
            .bytes_stream()
            .map_ok(|bytes| String::from_utf8_lossy(&bytes).into_owned());
        let frames = SseFrameStream::new(chunks).map(|payload| {
            let payload = payload?;
            let envelope: JsonRpcResponse = serde_json::from_str(&payload)?;
            if let Some(error) = envelope.error {
                return Err(error.into());
            }
            let result = envelope
                .result
                .ok_or_else(|| A2AError::Stream("Frame carries neither result nor error".into()))?;
            Ok(serde_json::from_value(result)?)
        });

        Ok(Box::pin(frames))
    }
}

impl std::fmt::Debug for A2AClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("A2AClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_increment_and_wrap() {
        let client = A2AClient::new("http://localhost:8080/a2a").unwrap();
        assert_eq!(client.next_request_id(), RequestId::Number(1));
        assert_eq!(client.next_request_id(), RequestId::Number(2));

        client.next_id.store(REQUEST_ID_BOUND - 1, Ordering::SeqCst);
        assert_eq!(
            client.next_request_id(),
            RequestId::Number(REQUEST_ID_BOUND - 1)
        );
        // Wrapped modulo the bound
        assert_eq!(client.next_request_id(), RequestId::Number(0));
    }

    #[test]
    fn test_well_known_url_resolution() {
        let client = A2AClient::new("http://localhost:8080/a2a").unwrap();
        let url = client.endpoint.join(crate::WELL_KNOWN_AGENT_PATH).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/.well-known/agent.json");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        assert!(A2AClient::new("not a url").is_err());
    }
}
