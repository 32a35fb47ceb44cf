//! Screening pipeline: sanitizer, structuring and matching stages, and the orchestrator.

pub mod matching;
mod orchestrator;
pub mod sanitize;
pub mod structure;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use matching::{Matcher, MatchingError};
pub use orchestrator::{
    EvaluationStatus, MIN_TEXT_CHARS, Pipeline, PipelineSettings, PipelineStage, RunOutcome,
};
pub use sanitize::sanitize;
pub use structure::{MAX_PROMPT_CHARS, Structurer, StructuringError};
pub use types::{CANDIDATE_KEYS, CandidateRecord, Decision, EvaluationRecord, JobDescription};
