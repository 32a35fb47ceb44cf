//! Per-document orchestration: read, structure, persist, evaluate, persist.

use super::matching::Matcher;
use super::structure::Structurer;
use super::types::{CandidateRecord, Decision, EvaluationRecord, JobDescription};
use crate::config::Config;
use crate::llm::ChatClient;
use crate::reader::DocumentReader;
use crate::store::{CandidateRow, EvaluationRow, RecordStore};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Shortest extracted text worth sending to the model, in characters.
pub const MIN_TEXT_CHARS: usize = 50;

/// Step a document run is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Extracting text from the source document.
    Reading,
    /// Turning text into a candidate record.
    Structuring,
    /// Writing the candidate row.
    PersistingCandidate,
    /// Scoring the candidate against the job.
    Evaluating,
    /// Writing the evaluation row.
    PersistingEvaluation,
    /// Finished.
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reading => "reading",
            Self::Structuring => "structuring",
            Self::PersistingCandidate => "persisting-candidate",
            Self::Evaluating => "evaluating",
            Self::PersistingEvaluation => "persisting-evaluation",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// What happened to the evaluation of a persisted candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationStatus {
    /// Evaluation produced and stored.
    Persisted {
        /// Identifier of the evaluation row.
        evaluation_id: String,
        /// Score reported by the model.
        score: Option<i64>,
        /// Decision reported by the model, when recognizable.
        decision: Option<Decision>,
    },
    /// Matching produced nothing; no row written.
    Skipped,
    /// Evaluation produced but the write failed. The candidate row stays.
    PersistFailed {
        /// Store error message.
        reason: String,
    },
}

/// Terminal state of one document run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Candidate persisted; see `evaluation` for the second half.
    Completed {
        /// Identifier generated for the candidate row.
        candidate_id: String,
        /// Evaluation result.
        evaluation: EvaluationStatus,
    },
    /// Run abandoned before a candidate row was written.
    Aborted {
        /// Stage that failed.
        stage: PipelineStage,
        /// Human-readable cause.
        reason: String,
    },
}

impl RunOutcome {
    fn aborted(stage: PipelineStage, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::warn!(%stage, reason = %reason, "Document aborted");
        Self::Aborted { stage, reason }
    }
}

/// Parameters shared by every run of a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Model used for both stages.
    pub model: String,
    /// Position candidates are screened for.
    pub job: JobDescription,
    /// Table receiving candidate rows.
    pub candidates_table: String,
    /// Table receiving evaluation rows.
    pub evaluations_table: String,
}

impl PipelineSettings {
    /// Settings derived from the loaded configuration.
    pub fn from_config(config: &Config, job: JobDescription) -> Self {
        Self {
            model: config.llm_model.clone(),
            job,
            candidates_table: config.candidates_table.clone(),
            evaluations_table: config.evaluations_table.clone(),
        }
    }
}

/// Sequences reader, structuring, matching, and persistence for one document at a time.
///
/// Holds no per-document state; independent instances can run side by side. Text extraction
/// runs on tokio's blocking pool, and a reader that panics aborts the run at
/// [`PipelineStage::Reading`].
pub struct Pipeline {
    reader: Arc<dyn DocumentReader>,
    store: Arc<dyn RecordStore>,
    structurer: Structurer,
    matcher: Matcher,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Wire the pipeline to its collaborators.
    pub fn new(
        reader: Arc<dyn DocumentReader>,
        chat: Arc<dyn ChatClient>,
        store: Arc<dyn RecordStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            reader,
            store,
            structurer: Structurer::new(chat.clone(), settings.model.clone()),
            matcher: Matcher::new(chat, settings.model.clone()),
            settings,
        }
    }

    /// Settings this pipeline runs with.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Process the document at `path` to completion or abortion.
    pub async fn run(&self, path: &Path) -> RunOutcome {
        let span = tracing::info_span!(
            "document",
            run_id = %Uuid::new_v4(),
            file = %path.display()
        );
        self.run_inner(path).instrument(span).await
    }

    async fn run_inner(&self, path: &Path) -> RunOutcome {
        tracing::info!(stage = %PipelineStage::Reading, "Extracting text");
        let raw_text = match self.read(path).await {
            Ok(text) => text,
            Err(reason) => return RunOutcome::aborted(PipelineStage::Reading, reason),
        };
        let chars = raw_text.chars().count();
        if chars < MIN_TEXT_CHARS {
            return RunOutcome::aborted(
                PipelineStage::Reading,
                format!("extracted {chars} characters; need at least {MIN_TEXT_CHARS}"),
            );
        }

        tracing::info!(stage = %PipelineStage::Structuring, chars, "Structuring candidate");
        let Some(candidate) = self.structurer.structure(&raw_text).await else {
            return RunOutcome::aborted(
                PipelineStage::Structuring,
                "model output could not be structured",
            );
        };
        tracing::info!(
            candidate = candidate.name().unwrap_or("unknown"),
            skills = candidate.skills().len(),
            "Candidate structured"
        );

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let candidate_id = match self
            .persist_candidate(&filename, &raw_text, &candidate)
            .await
        {
            Ok(id) => id,
            Err(reason) => return RunOutcome::aborted(PipelineStage::PersistingCandidate, reason),
        };

        let evaluation = self.evaluate_and_persist(&candidate_id, &candidate).await;
        tracing::info!(
            stage = %PipelineStage::Done,
            candidate_id = %candidate_id,
            evaluation = ?evaluation,
            "Document processed"
        );
        RunOutcome::Completed {
            candidate_id,
            evaluation,
        }
    }

    /// Run the synchronous extraction on tokio's blocking pool.
    async fn read(&self, path: &Path) -> Result<String, String> {
        let reader = Arc::clone(&self.reader);
        let path = path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || reader.extract(&path));
        match task.await {
            Ok(extracted) => extracted.map_err(|error| error.to_string()),
            Err(error) => Err(format!("reader task failed: {error}")),
        }
    }

    async fn persist_candidate(
        &self,
        filename: &str,
        raw_text: &str,
        candidate: &CandidateRecord,
    ) -> Result<String, String> {
        tracing::info!(stage = %PipelineStage::PersistingCandidate, "Saving candidate");
        let row = CandidateRow {
            filename,
            raw_text,
            structured: candidate,
        };
        let id = self
            .store
            .insert(&self.settings.candidates_table, row.to_value())
            .await
            .map_err(|error| error.to_string())?;
        tracing::info!(candidate_id = %id, "Candidate saved");
        Ok(id)
    }

    async fn evaluate_and_persist(
        &self,
        candidate_id: &str,
        candidate: &CandidateRecord,
    ) -> EvaluationStatus {
        let job = &self.settings.job;
        tracing::info!(
            stage = %PipelineStage::Evaluating,
            job = %job.title,
            "Evaluating candidate"
        );
        let Some(evaluation) = self.matcher.evaluate(candidate, job).await else {
            tracing::warn!(
                candidate_id,
                "No evaluation produced; candidate kept without one"
            );
            return EvaluationStatus::Skipped;
        };
        log_evaluation(&evaluation);

        tracing::info!(stage = %PipelineStage::PersistingEvaluation, "Saving evaluation");
        let row = EvaluationRow::new(candidate_id, job, &evaluation);
        match self
            .store
            .insert(&self.settings.evaluations_table, row.to_value())
            .await
        {
            Ok(evaluation_id) => {
                tracing::info!(evaluation_id = %evaluation_id, "Evaluation saved");
                EvaluationStatus::Persisted {
                    evaluation_id,
                    score: evaluation.score(),
                    decision: evaluation.decision(),
                }
            }
            Err(error) => {
                tracing::error!(candidate_id, error = %error, "Failed to save evaluation");
                EvaluationStatus::PersistFailed {
                    reason: error.to_string(),
                }
            }
        }
    }
}

fn log_evaluation(evaluation: &EvaluationRecord) {
    tracing::info!(
        score = ?evaluation.score(),
        decision = evaluation.decision_label().unwrap_or("missing"),
        "Candidate evaluated"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatError;
    use crate::pipeline::testing::{MemoryStore, PanickingReader, ScriptedChatClient, StaticReader};
    use serde_json::json;

    const RESUME: &str = "Ana Pérez · ana@example.com · \
                          Senior Python developer, 6 years with Docker and AWS.";
    const CANDIDATE_REPLY: &str = r#"{"name": "Ana Pérez", "email": "ana@example.com",
        "skills": ["Python", "Docker", "AWS"]}"#;
    const EVALUATION_REPLY: &str = r#"{"score": 82, "decision": "Fit",
        "reasoning": "Python, Docker and AWS", "pros": ["AWS"]}"#;

    struct Harness {
        chat: Arc<ScriptedChatClient>,
        store: Arc<MemoryStore>,
        pipeline: Pipeline,
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            model: "mistral".into(),
            job: JobDescription::default(),
            candidates_table: "candidates".into(),
            evaluations_table: "evaluations".into(),
        }
    }

    fn harness(
        text: &str,
        replies: Vec<Result<String, ChatError>>,
        store: MemoryStore,
    ) -> Harness {
        let chat = Arc::new(ScriptedChatClient::new(replies));
        let store = Arc::new(store);
        let pipeline = Pipeline::new(
            Arc::new(StaticReader(Ok(text.to_string()))),
            chat.clone(),
            store.clone(),
            settings(),
        );
        Harness {
            chat,
            store,
            pipeline,
        }
    }

    #[tokio::test]
    async fn full_run_persists_candidate_and_evaluation() {
        let h = harness(
            RESUME,
            vec![Ok(CANDIDATE_REPLY.into()), Ok(EVALUATION_REPLY.into())],
            MemoryStore::default(),
        );

        let outcome = h.pipeline.run(Path::new("/resumes/ana.pdf")).await;

        assert_eq!(
            outcome,
            RunOutcome::Completed {
                candidate_id: "1".into(),
                evaluation: EvaluationStatus::Persisted {
                    evaluation_id: "2".into(),
                    score: Some(82),
                    decision: Some(Decision::Fit),
                },
            }
        );
        let candidates = h.store.rows_in("candidates").await;
        assert_eq!(candidates[0]["filename"], "ana.pdf");
        assert_eq!(candidates[0]["raw_text"], RESUME);
        assert_eq!(candidates[0]["structured"]["phone"], "");
        let evaluations = h.store.rows_in("evaluations").await;
        assert_eq!(evaluations[0]["candidate_id"], "1");
        assert_eq!(evaluations[0]["job_title"], "Python Backend Developer");
        assert_eq!(evaluations[0]["details"]["pros"], json!(["AWS"]));
    }

    #[tokio::test]
    async fn text_below_minimum_never_reaches_the_model() {
        let text = "x".repeat(MIN_TEXT_CHARS - 1);
        let h = harness(
            &text,
            vec![Ok(CANDIDATE_REPLY.into())],
            MemoryStore::default(),
        );

        let outcome = h.pipeline.run(Path::new("short.txt")).await;

        assert!(matches!(
            outcome,
            RunOutcome::Aborted {
                stage: PipelineStage::Reading,
                ..
            }
        ));
        assert_eq!(h.chat.call_count().await, 0);
    }

    #[tokio::test]
    async fn text_at_minimum_proceeds_to_structuring() {
        let text = "x".repeat(MIN_TEXT_CHARS);
        let h = harness(
            &text,
            vec![Ok(CANDIDATE_REPLY.into())],
            MemoryStore::default(),
        );

        h.pipeline.run(Path::new("edge.txt")).await;

        assert!(h.chat.call_count().await >= 1);
    }

    #[tokio::test]
    async fn unreadable_document_aborts_at_reading() {
        let chat = Arc::new(ScriptedChatClient::new(vec![]));
        let pipeline = Pipeline::new(
            Arc::new(StaticReader(Err("gone".into()))),
            chat.clone(),
            Arc::new(MemoryStore::default()),
            settings(),
        );

        let outcome = pipeline.run(Path::new("missing.pdf")).await;

        assert!(matches!(
            outcome,
            RunOutcome::Aborted {
                stage: PipelineStage::Reading,
                ref reason,
            } if reason.contains("missing.pdf")
        ));
        assert_eq!(chat.call_count().await, 0);
    }

    #[tokio::test]
    async fn crashing_reader_aborts_at_reading() {
        let chat = Arc::new(ScriptedChatClient::new(vec![Ok(CANDIDATE_REPLY.into())]));
        let store = Arc::new(MemoryStore::default());
        let pipeline = Pipeline::new(
            Arc::new(PanickingReader),
            chat.clone(),
            store.clone(),
            settings(),
        );

        let outcome = pipeline.run(Path::new("broken.pdf")).await;

        assert!(matches!(
            outcome,
            RunOutcome::Aborted {
                stage: PipelineStage::Reading,
                ref reason,
            } if reason.contains("reader task failed")
        ));
        assert_eq!(chat.call_count().await, 0);
        assert!(store.rows_in("candidates").await.is_empty());
    }

    #[tokio::test]
    async fn structuring_failure_aborts_without_writes() {
        let h = harness(
            RESUME,
            vec![Err(ChatError::Connection("refused".into()))],
            MemoryStore::default(),
        );

        let outcome = h.pipeline.run(Path::new("ana.pdf")).await;

        assert!(matches!(
            outcome,
            RunOutcome::Aborted {
                stage: PipelineStage::Structuring,
                ..
            }
        ));
        assert!(h.store.rows_in("candidates").await.is_empty());
    }

    #[tokio::test]
    async fn candidate_write_failure_skips_evaluation() {
        let h = harness(
            RESUME,
            vec![Ok(CANDIDATE_REPLY.into()), Ok(EVALUATION_REPLY.into())],
            MemoryStore::rejecting("candidates"),
        );

        let outcome = h.pipeline.run(Path::new("ana.pdf")).await;

        assert!(matches!(
            outcome,
            RunOutcome::Aborted {
                stage: PipelineStage::PersistingCandidate,
                ..
            }
        ));
        assert_eq!(h.chat.call_count().await, 1);
    }

    #[tokio::test]
    async fn matching_failure_still_completes_with_candidate() {
        let h = harness(
            RESUME,
            vec![
                Ok(CANDIDATE_REPLY.into()),
                Err(ChatError::Inference("CUDA error".into())),
            ],
            MemoryStore::default(),
        );

        let outcome = h.pipeline.run(Path::new("ana.pdf")).await;

        assert_eq!(
            outcome,
            RunOutcome::Completed {
                candidate_id: "1".into(),
                evaluation: EvaluationStatus::Skipped,
            }
        );
        assert_eq!(h.store.rows_in("candidates").await.len(), 1);
        assert!(h.store.rows_in("evaluations").await.is_empty());
        assert_eq!(h.chat.call_count().await, 2);
    }

    #[tokio::test]
    async fn evaluation_write_failure_keeps_candidate() {
        let h = harness(
            RESUME,
            vec![Ok(CANDIDATE_REPLY.into()), Ok(EVALUATION_REPLY.into())],
            MemoryStore::rejecting("evaluations"),
        );

        let outcome = h.pipeline.run(Path::new("ana.pdf")).await;

        assert!(matches!(
            outcome,
            RunOutcome::Completed {
                evaluation: EvaluationStatus::PersistFailed { .. },
                ..
            }
        ));
        assert_eq!(h.store.rows_in("candidates").await.len(), 1);
    }
}
