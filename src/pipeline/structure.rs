//! Structuring stage: resume text to [`CandidateRecord`].
//!
//! The model is asked for a JSON object, its reply is sanitized and merged onto the
//! zero-value schema. An inference fault gets exactly one retry with acceleration disabled.
//! An unreachable backend or an unparseable reply does not.

use super::sanitize::sanitize;
use super::types::{CANDIDATE_KEYS, CandidateRecord};
use crate::llm::{ChatClient, ChatError, ChatRequest, ExecutionMode};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Characters of resume text embedded in the prompt.
pub const MAX_PROMPT_CHARS: usize = 12_000;

/// Reasons a structuring attempt produced no record.
#[derive(Debug, Error)]
pub enum StructuringError {
    /// The model call failed.
    #[error(transparent)]
    Chat(#[from] ChatError),
    /// The reply could not be parsed as JSON even after sanitization.
    #[error("Model reply is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    /// The reply parsed, but not to an object.
    #[error("Model reply is JSON but not an object (got {0})")]
    NotAnObject(&'static str),
}

impl StructuringError {
    /// Whether a degraded-mode retry could plausibly succeed.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Chat(error) => !error.is_connection(),
            Self::Decode(_) | Self::NotAnObject(_) => false,
        }
    }
}

/// Drives the structuring model call.
pub struct Structurer {
    client: Arc<dyn ChatClient>,
    model: String,
}

impl Structurer {
    /// Build a structurer issuing requests for `model` through `client`.
    pub fn new(client: Arc<dyn ChatClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Turn `raw_text` into a candidate record, or `None` when every path failed.
    pub async fn structure(&self, raw_text: &str) -> Option<CandidateRecord> {
        match self.try_structure(raw_text).await {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::error!(error = %error, "Structuring failed");
                None
            }
        }
    }

    /// Same as [`Structurer::structure`], keeping the failure reason.
    pub async fn try_structure(
        &self,
        raw_text: &str,
    ) -> Result<CandidateRecord, StructuringError> {
        let request = ChatRequest::prompt(&self.model, build_prompt(raw_text));
        tracing::info!(model = %self.model, "Structuring resume text");

        match self.attempt(1, request.clone()).await {
            Ok(record) => Ok(record),
            Err(error) if error.is_retryable() => {
                tracing::warn!(
                    attempt = 1,
                    error = %error,
                    "Inference failed; retrying once with acceleration disabled"
                );
                self.attempt(2, request.with_mode(ExecutionMode::Degraded))
                    .await
                    .inspect_err(|retry_error| {
                        tracing::error!(
                            attempt = 2,
                            error = %retry_error,
                            "Degraded retry failed as well"
                        );
                    })
            }
            Err(error) => {
                if let StructuringError::Chat(chat_error) = &error
                    && chat_error.is_connection()
                {
                    tracing::error!(
                        attempt = 1,
                        error = %chat_error,
                        "Inference backend unreachable; is `ollama serve` running?"
                    );
                }
                Err(error)
            }
        }
    }

    async fn attempt(
        &self,
        attempt: u8,
        request: ChatRequest,
    ) -> Result<CandidateRecord, StructuringError> {
        let mode = request.mode;
        tracing::debug!(attempt, ?mode, "Requesting candidate record");
        let reply = self.client.chat(request).await?;
        tracing::debug!(
            attempt,
            ?mode,
            reply_chars = reply.chars().count(),
            "Structuring reply received"
        );
        parse_candidate(&reply)
    }
}

fn parse_candidate(reply: &str) -> Result<CandidateRecord, StructuringError> {
    match serde_json::from_str::<Value>(&sanitize(reply))? {
        Value::Object(fields) => Ok(CandidateRecord::merge_onto_schema(fields)),
        other => Err(StructuringError::NotAnObject(json_kind(&other))),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

fn build_prompt(raw_text: &str) -> String {
    let keys = CANDIDATE_KEYS.join(", ");
    format!(
        "You are an expert HR data assistant. Extract structured data from this resume.\n\n\
         OUTPUT JSON ONLY. NO MARKDOWN. NO INTRODUCTIONS.\n\
         Ensure the following keys exist: {keys}.\n\
         `skills` is a list of strings; `experience` and `education` are lists of objects.\n\n\
         RESUME TEXT:\n{}",
        truncate_chars(raw_text, MAX_PROMPT_CHARS)
    )
}
