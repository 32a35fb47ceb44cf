use crate::pipeline::{EvaluationStatus, RunOutcome};
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing a screening batch.
#[derive(Default)]
pub struct BatchMetrics {
    documents_seen: AtomicU64,
    candidates_persisted: AtomicU64,
    documents_aborted: AtomicU64,
    evaluations_persisted: AtomicU64,
}

impl BatchMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one document run.
    pub fn record(&self, outcome: &RunOutcome) {
        self.documents_seen.fetch_add(1, Ordering::Relaxed);
        match outcome {
            RunOutcome::Completed { evaluation, .. } => {
                self.candidates_persisted.fetch_add(1, Ordering::Relaxed);
                if matches!(evaluation, EvaluationStatus::Persisted { .. }) {
                    self.evaluations_persisted.fetch_add(1, Ordering::Relaxed);
                }
            }
            RunOutcome::Aborted { .. } => {
                self.documents_aborted.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_seen: self.documents_seen.load(Ordering::Relaxed),
            candidates_persisted: self.candidates_persisted.load(Ordering::Relaxed),
            documents_aborted: self.documents_aborted.load(Ordering::Relaxed),
            evaluations_persisted: self.evaluations_persisted.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of batch counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents the batch attempted.
    pub documents_seen: u64,
    /// Documents whose candidate row was written.
    pub candidates_persisted: u64,
    /// Documents abandoned before a candidate row was written.
    pub documents_aborted: u64,
    /// Evaluation rows written.
    pub evaluations_persisted: u64,
}
