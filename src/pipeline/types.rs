//! Records produced by the screening pipeline.

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::fmt;

/// Keys every candidate record carries, in schema order.
pub const CANDIDATE_KEYS: [&str; 6] = [
    "name",
    "email",
    "phone",
    "skills",
    "experience",
    "education",
];

/// Structured candidate extracted from a resume.
///
/// Always contains every key in [`CANDIDATE_KEYS`]; keys the model invents on top of those
/// are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CandidateRecord(Map<String, Value>);

impl CandidateRecord {
    /// Zero-value schema used as the merge base.
    pub fn schema() -> Map<String, Value> {
        let mut schema = Map::new();
        schema.insert("name".into(), json!(""));
        schema.insert("email".into(), json!(""));
        schema.insert("phone".into(), json!(""));
        schema.insert("skills".into(), json!([]));
        schema.insert("experience".into(), json!([]));
        schema.insert("education".into(), json!([]));
        schema
    }

    /// Lay `extracted` over the zero-value schema. Extracted keys win.
    pub fn merge_onto_schema(extracted: Map<String, Value>) -> Self {
        let mut merged = Self::schema();
        merged.extend(extracted);
        Self(merged)
    }

    /// Candidate name, when the model produced a string.
    pub fn name(&self) -> Option<&str> {
        self.0
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
    }

    /// Skill list, skipping non-string entries.
    pub fn skills(&self) -> Vec<&str> {
        self.0
            .get("skills")
            .and_then(Value::as_array)
            .map(|skills| skills.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Raw field access.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Borrow the underlying mapping.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Outcome class assigned by the matching stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    /// Score at or above the fit threshold.
    #[serde(rename = "Fit")]
    Fit,
    /// Score between the two thresholds.
    #[serde(rename = "Review")]
    Review,
    /// Score below the rejection threshold.
    #[serde(rename = "Not Fit")]
    NotFit,
}

impl Decision {
    /// Minimum score for [`Decision::Fit`].
    pub const FIT_THRESHOLD: i64 = 70;
    /// Scores below this are [`Decision::NotFit`].
    pub const REJECT_THRESHOLD: i64 = 50;

    /// Label used in prompts and persisted rows.
    pub fn label(self) -> &'static str {
        match self {
            Self::Fit => "Fit",
            Self::Review => "Review",
            Self::NotFit => "Not Fit",
        }
    }

    /// Parse a model-supplied label, ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "fit" => Some(Self::Fit),
            "review" => Some(Self::Review),
            "not fit" => Some(Self::NotFit),
            _ => None,
        }
    }

    /// Decision the thresholds assign to `score`.
    pub fn for_score(score: i64) -> Self {
        if score >= Self::FIT_THRESHOLD {
            Self::Fit
        } else if score < Self::REJECT_THRESHOLD {
            Self::NotFit
        } else {
            Self::Review
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Evaluation returned by the matching stage, exactly as the model produced it.
///
/// No defaults are filled in: a key the model omitted is simply absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EvaluationRecord(Map<String, Value>);

impl EvaluationRecord {
    /// Wrap a parsed model object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Integer score, accepting whole floats such as `85.0`.
    pub fn score(&self) -> Option<i64> {
        let score = self.0.get("score")?;
        score.as_i64().or_else(|| {
            score
                .as_f64()
                .filter(|value| value.fract() == 0.0)
                .map(|value| value as i64)
        })
    }

    /// Decision label exactly as the model wrote it.
    pub fn decision_label(&self) -> Option<&str> {
        self.0.get("decision").and_then(Value::as_str)
    }

    /// Parsed decision, when the label is one of the known values.
    pub fn decision(&self) -> Option<Decision> {
        self.decision_label().and_then(Decision::from_label)
    }

    /// Free-text reasoning.
    pub fn reasoning(&self) -> Option<&str> {
        self.0.get("reasoning").and_then(Value::as_str)
    }

    /// Raw field access.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Borrow the underlying mapping.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Position the job is screened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescription {
    /// Short title stored next to each evaluation.
    pub title: String,
    /// Required qualifications, embedded verbatim in the matching prompt.
    pub description: String,
}

impl JobDescription {
    /// Build a job description from its parts.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

impl Default for JobDescription {
    fn default() -> Self {
        Self::new(
            "Python Backend Developer",
            "Looking for a Senior Python Developer for backend work.\n\
             Requirements:\n\
             - More than 3 years of experience with Python.\n\
             - Mandatory experience with Docker and AWS.\n\
             - Knowledge of SQL.\n\
             - Intermediate/advanced English.\n\
             - Nice to have: experience leading teams or as Tech Lead.",
        )
    }
}
