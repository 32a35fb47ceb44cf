//! Scripted collaborators for pipeline unit tests.

use crate::llm::{ChatClient, ChatError, ChatRequest, ExecutionMode};
use crate::reader::{DocumentReader, ReaderError};
use crate::store::{RecordStore, StoreError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// Chat client replaying a fixed list of replies and recording every request.
pub(crate) struct ScriptedChatClient {
    replies: Mutex<VecDeque<Result<String, ChatError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatClient {
    pub(crate) fn new(replies: Vec<Result<String, ChatError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub(crate) async fn recorded_modes(&self) -> Vec<ExecutionMode> {
        self.requests
            .lock()
            .await
            .iter()
            .map(|request| request.mode)
            .collect()
    }

    pub(crate) async fn recorded_prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .await
            .iter()
            .flat_map(|request| {
                request
                    .messages
                    .iter()
                    .map(|message| message.content.clone())
            })
            .collect()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<String, ChatError> {
        self.requests.lock().await.push(request);
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(ChatError::Inference("script exhausted".into())))
    }
}

/// In-memory store assigning sequential ids, optionally rejecting one table.
#[derive(Default)]
pub(crate) struct MemoryStore {
    rows: Mutex<Vec<(String, Value)>>,
    rejected_table: Option<String>,
}

impl MemoryStore {
    pub(crate) fn rejecting(table: &str) -> Self {
        Self {
            rows: Mutex::default(),
            rejected_table: Some(table.to_string()),
        }
    }

    pub(crate) async fn rows_in(&self, table: &str) -> Vec<Value> {
        self.rows
            .lock()
            .await
            .iter()
            .filter(|(name, _)| name == table)
            .map(|(_, row)| row.clone())
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, table: &str, record: Value) -> Result<String, StoreError> {
        if self.rejected_table.as_deref() == Some(table) {
            return Err(StoreError::UnexpectedStatus {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "store offline".into(),
            });
        }
        let mut rows = self.rows.lock().await;
        rows.push((table.to_string(), record));
        Ok(rows.len().to_string())
    }
}

/// Reader returning a canned text for every path.
pub(crate) struct StaticReader(pub(crate) Result<String, String>);

impl DocumentReader for StaticReader {
    fn extract(&self, path: &Path) -> Result<String, ReaderError> {
        self.0
            .clone()
            .map_err(|_| ReaderError::NotFound(path.to_path_buf()))
    }
}

/// Reader that panics on every call, like a parser crashing on a malformed file.
pub(crate) struct PanickingReader;

impl DocumentReader for PanickingReader {
    fn extract(&self, path: &Path) -> Result<String, ReaderError> {
        panic!("parser crashed on {}", path.display())
    }
}

/// Collects plain-text log output of the current thread while installed.
#[derive(Clone, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Route events to this capture until the guard drops.
    pub(crate) fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub(crate) fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
