#![deny(missing_docs)]

//! Core library for cvsift, a resume screening pipeline backed by a local LLM.

/// Environment-driven configuration management.
pub mod config;
/// Chat-completion client abstraction and the Ollama adapter.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Batch outcome counters.
pub mod metrics;
/// Structuring, matching, and per-document orchestration.
pub mod pipeline;
/// Resume text extraction.
pub mod reader;
/// Durable storage for candidates and evaluations.
pub mod store;
