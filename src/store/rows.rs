//! Row shapes written to the candidates and evaluations tables.

use crate::pipeline::{CandidateRecord, EvaluationRecord, JobDescription};
use serde::Serialize;
use serde_json::Value;

/// Row inserted into the candidates table.
#[derive(Debug, Serialize)]
pub struct CandidateRow<'a> {
    /// Source document file name.
    pub filename: &'a str,
    /// Text extracted from the document, untruncated.
    pub raw_text: &'a str,
    /// Structured candidate record.
    pub structured: &'a CandidateRecord,
}

impl CandidateRow<'_> {
    /// JSON body for the store insert.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Row inserted into the evaluations table.
#[derive(Debug, Serialize)]
pub struct EvaluationRow<'a> {
    /// Identifier generated for the candidate row.
    pub candidate_id: &'a str,
    /// Title of the screened position.
    pub job_title: &'a str,
    /// Model score, when present.
    pub score: Option<i64>,
    /// Model decision label, verbatim.
    pub decision: Option<&'a str>,
    /// Model reasoning.
    pub reasoning: Option<&'a str>,
    /// Full evaluation mapping.
    pub details: &'a EvaluationRecord,
}

impl<'a> EvaluationRow<'a> {
    /// Assemble the row for `evaluation` of `candidate_id` against `job`.
    pub fn new(
        candidate_id: &'a str,
        job: &'a JobDescription,
        evaluation: &'a EvaluationRecord,
    ) -> Self {
        Self {
            candidate_id,
            job_title: &job.title,
            score: evaluation.score(),
            decision: evaluation.decision_label(),
            reasoning: evaluation.reasoning(),
            details: evaluation,
        }
    }

    /// JSON body for the store insert.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
