//! Matching stage: score a [`CandidateRecord`] against a [`JobDescription`].
//!
//! One model call, no retry. The parsed reply is returned verbatim; nothing is merged in.

use super::sanitize::sanitize;
use super::structure::json_kind;
use super::types::{CandidateRecord, Decision, EvaluationRecord, JobDescription};
use crate::llm::{ChatClient, ChatError, ChatRequest};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Reasons the matching stage produced no evaluation.
#[derive(Debug, Error)]
pub enum MatchingError {
    /// The model call failed.
    #[error(transparent)]
    Chat(#[from] ChatError),
    /// The candidate record could not be rendered for the prompt.
    #[error("Failed to serialize candidate: {0}")]
    Serialize(serde_json::Error),
    /// The reply could not be parsed as JSON even after sanitization.
    #[error("Model reply is not valid JSON: {0}")]
    Decode(serde_json::Error),
    /// The reply parsed, but not to an object.
    #[error("Model reply is JSON but not an object (got {0})")]
    NotAnObject(&'static str),
}

/// Drives the evaluation model call.
pub struct Matcher {
    client: Arc<dyn ChatClient>,
    model: String,
}

impl Matcher {
    /// Build a matcher issuing requests for `model` through `client`.
    pub fn new(client: Arc<dyn ChatClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Evaluate `candidate` for `job`, or `None` on any failure.
    pub async fn evaluate(
        &self,
        candidate: &CandidateRecord,
        job: &JobDescription,
    ) -> Option<EvaluationRecord> {
        match self.try_evaluate(candidate, job).await {
            Ok(evaluation) => Some(evaluation),
            Err(error) => {
                tracing::error!(error = %error, "Matching failed");
                None
            }
        }
    }

    /// Same as [`Matcher::evaluate`], keeping the failure reason.
    pub async fn try_evaluate(
        &self,
        candidate: &CandidateRecord,
        job: &JobDescription,
    ) -> Result<EvaluationRecord, MatchingError> {
        let profile = serde_json::to_string_pretty(candidate).map_err(MatchingError::Serialize)?;
        let request = ChatRequest::prompt(&self.model, build_prompt(&profile, job));
        tracing::info!(model = %self.model, job = %job.title, "Evaluating candidate fit");

        let reply = self.client.chat(request).await?;
        let evaluation = parse_evaluation(&reply)?;
        flag_threshold_mismatch(&evaluation);
        Ok(evaluation)
    }
}

fn parse_evaluation(reply: &str) -> Result<EvaluationRecord, MatchingError> {
    let value: Value = serde_json::from_str(&sanitize(reply)).map_err(MatchingError::Decode)?;
    match value {
        Value::Object(fields) => Ok(EvaluationRecord::new(fields)),
        other => Err(MatchingError::NotAnObject(json_kind(&other))),
    }
}

/// The model's decision is kept even when it contradicts its own score; this only logs it.
fn flag_threshold_mismatch(evaluation: &EvaluationRecord) {
    let (Some(score), Some(label)) = (evaluation.score(), evaluation.decision_label()) else {
        return;
    };
    let expected = Decision::for_score(score);
    if Decision::from_label(label) != Some(expected) {
        tracing::warn!(
            score,
            decision = label,
            expected = %expected,
            "Model decision disagrees with score thresholds; keeping model decision"
        );
    }
}

fn build_prompt(profile: &str, job: &JobDescription) -> String {
    format!(
        "You are a Senior Technical Recruiter. \
         Evaluate this candidate for the job description provided.\n\n\
         JOB DESCRIPTION:\n{description}\n\n\
         CANDIDATE PROFILE (JSON):\n{profile}\n\n\
         TASK:\n\
         1. Analyze whether the candidate has the required skills and experience.\n\
         2. Assign an integer score from 0 to 100.\n\
         3. Determine a decision: \"{fit}\" (score >= {fit_at}), \
         \"{not_fit}\" (score < {reject_below}), or \"{review}\" ({reject_below}-{review_max}).\n\
         4. Provide brief reasoning citing specific evidence \
         (e.g. \"Has Python but lacks AWS\").\n\n\
         OUTPUT FORMAT (valid JSON only):\n\
         {{\n  \
         \"score\": 85,\n  \
         \"decision\": \"{fit}\",\n  \
         \"reasoning\": \"Strong Python experience...\",\n  \
         \"pros\": [\"skill1\", \"skill2\"],\n  \
         \"cons\": [\"missing_skill1\"]\n\
         }}\n\n\
         CRITICAL: Return ONLY JSON. No Markdown.",
        description = job.description.trim(),
        fit = Decision::Fit,
        not_fit = Decision::NotFit,
        review = Decision::Review,
        fit_at = Decision::FIT_THRESHOLD,
        reject_below = Decision::REJECT_THRESHOLD,
        review_max = Decision::FIT_THRESHOLD - 1,
    )
}
