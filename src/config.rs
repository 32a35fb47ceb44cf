use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Default Ollama endpoint used when `OLLAMA_URL` is absent.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
/// Default model used by both the structuring and matching stages.
pub const DEFAULT_MODEL: &str = "mistral";
/// Default table receiving structured candidates.
pub const DEFAULT_CANDIDATES_TABLE: &str = "candidates";
/// Default table receiving evaluations.
pub const DEFAULT_EVALUATIONS_TABLE: &str = "evaluations";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the screening pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Supabase project that stores candidates and evaluations.
    pub supabase_url: String,
    /// Service key sent with every Supabase request.
    pub supabase_key: String,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Model identifier passed to Ollama.
    pub llm_model: String,
    /// Table receiving structured candidate rows.
    pub candidates_table: String,
    /// Table receiving evaluation rows.
    pub evaluations_table: String,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let supabase_url = load_env("SUPABASE_URL")?;
        if reqwest::Url::parse(&supabase_url).is_err() {
            return Err(ConfigError::InvalidValue("SUPABASE_URL".into()));
        }

        Ok(Self {
            supabase_url,
            supabase_key: load_env("SUPABASE_KEY")?,
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            llm_model: load_env_optional("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            candidates_table: load_env_optional("CANDIDATES_TABLE")
                .unwrap_or_else(|| DEFAULT_CANDIDATES_TABLE.to_string()),
            evaluations_table: load_env_optional("EVALUATIONS_TABLE")
                .unwrap_or_else(|| DEFAULT_EVALUATIONS_TABLE.to_string()),
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// Missing store credentials are a startup failure, so the error is returned to the binary
/// rather than surfacing later inside a pipeline run.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        supabase_url = %config.supabase_url,
        ollama_url = %config.ollama_url,
        model = %config.llm_model,
        candidates_table = %config.candidates_table,
        evaluations_table = %config.evaluations_table,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
