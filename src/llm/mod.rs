//! Chat-completion client used by the structuring and matching stages.
//!
//! The Ollama adapter talks to the runtime over plain HTTP. Failures are classified where they
//! happen: a request that never reaches the backend is a [`ChatError::Connection`], anything the
//! backend itself rejects is an inference failure.

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Errors surfaced by chat-completion providers.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The inference backend could not be reached at all.
    #[error("Inference backend unreachable: {0}")]
    Connection(String),
    /// The backend was reachable but failed to run the model.
    #[error("Inference failed: {0}")]
    Inference(String),
    /// The backend answered with an envelope that could not be decoded.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

impl ChatError {
    /// Whether the failure means the backend itself is down.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instructions.
    System,
    /// End-user prompt.
    User,
    /// Model output.
    Assistant,
}

/// Single message in a chat exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: ChatRole,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// How the backend should execute the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Backend default, hardware-accelerated when available.
    #[default]
    Accelerated,
    /// Acceleration disabled; slower but survives GPU faults.
    Degraded,
}

impl ExecutionMode {
    /// Whether hardware acceleration may be used.
    pub fn use_accelerator(self) -> bool {
        matches!(self, Self::Accelerated)
    }
}

/// Request payload passed to a chat provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Conversation sent to the model.
    pub messages: Vec<ChatMessage>,
    /// Requested execution mode.
    pub mode: ExecutionMode,
}

impl ChatRequest {
    /// Single-prompt request in the default execution mode.
    pub fn prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::user(prompt)],
            mode: ExecutionMode::Accelerated,
        }
    }

    /// Same request, forced into `mode`.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Interface implemented by chat-completion providers.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Run the conversation and return the assistant's raw text.
    async fn chat(&self, request: ChatRequest) -> Result<String, ChatError>;
}

/// Ollama-backed chat client.
pub struct OllamaChatClient {
    http: Client,
    base_url: String,
}

impl OllamaChatClient {
    /// Build a client for the Ollama runtime at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChatError> {
        let http = Client::builder()
            .user_agent("cvsift/chat")
            .build()
            .map_err(|error| {
                ChatError::Connection(format!("failed to build HTTP client: {error}"))
            })?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Build a client from the loaded configuration.
    pub fn from_config() -> Result<Self, ChatError> {
        Self::new(get_config().ollama_url.clone())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    /// Probe the runtime by listing its installed models.
    pub async fn check_available(&self) -> Result<Vec<String>, ChatError> {
        let response = self
            .http
            .get(self.endpoint("api/tags"))
            .send()
            .await
            .map_err(|error| self.classify_send_error(error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Inference(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: TagsResponse = response.json().await.map_err(|error| {
            ChatError::InvalidResponse(format!("failed to decode model list: {error}"))
        })?;
        Ok(body.models.into_iter().map(|model| model.name).collect())
    }

    fn classify_send_error(&self, error: reqwest::Error) -> ChatError {
        if error.is_connect() {
            ChatError::Connection(format!(
                "failed to reach Ollama at {}: {error}",
                self.base_url
            ))
        } else {
            ChatError::Inference(format!("request to Ollama failed: {error}"))
        }
    }
}

fn build_payload(request: &ChatRequest) -> Value {
    let mut payload = json!({
        "model": request.model,
        "messages": request.messages,
        "stream": false,
    });
    if !request.mode.use_accelerator() {
        payload["options"] = json!({ "num_gpu": 0 });
    }
    payload
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[async_trait]
impl ChatClient for OllamaChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<String, ChatError> {
        tracing::debug!(
            model = %request.model,
            mode = ?request.mode,
            messages = request.messages.len(),
            "Sending chat request"
        );

        let response = self
            .http
            .post(self.endpoint("api/chat"))
            .json(&build_payload(&request))
            .send()
            .await
            .map_err(|error| self.classify_send_error(error))?;

        if response.status() == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Inference(format!(
                "model '{}' not available: {body}",
                request.model
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Inference(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            ChatError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(ChatError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };

    fn client_for(server: &MockServer) -> OllamaChatClient {
        OllamaChatClient::new(server.base_url()).expect("client")
    }

    #[tokio::test]
    async fn chat_returns_assistant_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chat")
                    .json_body_partial(r#"{"model":"mistral","stream":false}"#);
                then.status(200).json_body(json!({
                    "model": "mistral",
                    "message": { "role": "assistant", "content": "{\"name\":\"Ana\"}" },
                    "done": true
                }));
            })
            .await;

        let content = client_for(&server)
            .chat(ChatRequest::prompt("mistral", "Extract"))
            .await
            .expect("content");

        mock.assert_async().await;
        assert_eq!(content, "{\"name\":\"Ana\"}");
    }

    #[tokio::test]
    async fn degraded_mode_disables_gpu_layers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chat")
                    .json_body_partial(r#"{"options":{"num_gpu":0}}"#);
                then.status(200).json_body(json!({
                    "message": { "role": "assistant", "content": "ok" },
                    "done": true
                }));
            })
            .await;

        let request = ChatRequest::prompt("mistral", "Extract")
            .with_mode(ExecutionMode::Degraded);
        let content = client_for(&server)
            .chat(request)
            .await
            .expect("content");

        mock.assert_async().await;
        assert_eq!(content, "ok");
    }

    #[test]
    fn accelerated_payload_has_no_options() {
        let payload = build_payload(&ChatRequest::prompt("mistral", "hi"));
        assert!(payload.get("options").is_none());
        assert_eq!(payload["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn server_error_is_an_inference_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(500).body("CUDA error: out of memory");
            })
            .await;

        let error = client_for(&server)
            .chat(ChatRequest::prompt("mistral", "Extract"))
            .await
            .expect_err("error response");

        assert!(!error.is_connection());
        assert!(matches!(error, ChatError::Inference(message) if message.contains("500")));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connection_failure() {
        // Port 9 (discard) is closed on test hosts.
        let client = OllamaChatClient::new("http://127.0.0.1:9").expect("client");
        let error = client
            .chat(ChatRequest::prompt("mistral", "Extract"))
            .await
            .expect_err("no backend");
        assert!(error.is_connection(), "unexpected error: {error}");
    }

    #[tokio::test]
    async fn check_available_lists_models() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/tags");
                then.status(200).json_body(json!({
                    "models": [{ "name": "mistral:latest" }, { "name": "llama3:8b" }]
                }));
            })
            .await;

        let models = client_for(&server).check_available().await.expect("models");
        assert_eq!(models, vec!["mistral:latest", "llama3:8b"]);
    }
}
