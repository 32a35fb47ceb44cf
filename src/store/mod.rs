//! Supabase (PostgREST) persistence for candidates and evaluations.

mod rows;

pub use rows::{CandidateRow, EvaluationRow};

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use thiserror::Error;

/// Errors returned while writing to the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The store responded with an unexpected status code.
    #[error("Unexpected store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The insert succeeded but no generated identifier came back.
    #[error("Store response for table '{0}' did not include an id")]
    MissingId(String),
}

/// Append-only record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert `record` into `table` and return the generated identifier.
    async fn insert(&self, table: &str, record: Value) -> Result<String, StoreError>;
}

/// Lightweight HTTP client for the Supabase REST API.
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    /// Build a client for the project at `url` authenticated with `api_key`.
    pub fn new(url: &str, api_key: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder().user_agent("cvsift/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(StoreError::InvalidUrl)?;
        let api_key = api_key.into();
        tracing::debug!(
            url = %base_url,
            has_api_key = !api_key.is_empty(),
            "Initialized Supabase HTTP client"
        );
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Build a client from the loaded configuration.
    pub fn from_config() -> Result<Self, StoreError> {
        let config = get_config();
        Self::new(&config.supabase_url, config.supabase_key.clone())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl RecordStore for SupabaseStore {
    async fn insert(&self, table: &str, record: Value) -> Result<String, StoreError> {
        let response = self
            .request(Method::POST, &format!("rest/v1/{table}"))
            .header("Prefer", "return=representation")
            .json(&record)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StoreError::UnexpectedStatus { status, body };
            tracing::error!(table, error = %error, "Store insert failed");
            return Err(error);
        }

        let rows: Value = response.json().await?;
        let id = extract_generated_id(&rows).ok_or_else(|| StoreError::MissingId(table.into()))?;
        tracing::debug!(table, id = %id, "Row inserted");
        Ok(id)
    }
}

/// Pull the `id` column out of a PostgREST representation (array of rows or a single row).
fn extract_generated_id(rows: &Value) -> Option<String> {
    let row = match rows {
        Value::Array(items) => items.first()?,
        Value::Object(_) => rows,
        _ => return None,
    };
    match row.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
