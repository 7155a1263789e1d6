//! Principle evaluation pipeline
//!
//! Store → extractor → scorer / detector → report. One call to
//! [`evaluate_principles`] performs a full pass over the markdown store.

pub mod extractor;
pub mod scorer;
pub mod detector;
pub mod report;
pub mod patterns;

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

pub use extractor::{Insight, InsightCategory, extract_insights};
pub use scorer::{Evaluation, EvaluationStatus, EvidenceItem, evaluate};
pub use detector::{Candidate, CandidateExample, PrincipleLimits, detect_candidates, enforce_principle_limits};
pub use report::EvaluationReport;

use crate::config::EvaluationConfig;
use crate::memory::{load_principles, CnsLayout, LearningRecord, Principle};

/// Status counts of one evaluation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvaluationSummary {
    pub active: usize,
    pub under_review: usize,
    pub unused: usize,
    pub candidates: usize,
}

impl EvaluationSummary {
    /// Anything a human should look at?
    pub fn needs_attention(&self) -> bool {
        self.under_review > 0 || self.candidates > 0
    }
}

/// Everything produced by one evaluation pass
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutcome {
    #[serde(skip)]
    pub principles: Vec<Principle>,
    #[serde(skip)]
    pub learnings: Vec<LearningRecord>,
    pub evaluations: Vec<Evaluation>,
    pub candidates: Vec<Candidate>,
    pub summary: EvaluationSummary,
    pub generated_at: DateTime<Local>,
    pub days_back: u32,
    /// Rendered markdown report
    #[serde(skip)]
    pub report: String,
}

fn summarize(evaluations: &[Evaluation], candidates: &[Candidate]) -> EvaluationSummary {
    let count = |status| evaluations.iter().filter(|e| e.status == status).count();
    EvaluationSummary {
        active: count(EvaluationStatus::Active),
        under_review: count(EvaluationStatus::UnderReview),
        unused: count(EvaluationStatus::Unused),
        candidates: candidates.len(),
    }
}

/// Run a full evaluation pass over the store.
///
/// Read-only: nothing is written back to the markdown files.
pub fn evaluate_principles(layout: &CnsLayout, config: &EvaluationConfig) -> Result<EvaluationOutcome> {
    let principles = load_principles(layout)?;
    info!("Loaded {} principles", principles.len());

    let learnings = crate::memory::load_learnings(layout, config.days_back)?;
    info!("Loaded {} learning entries", learnings.len());

    let evaluations = evaluate(&principles, &learnings);

    let limits = config.limits();
    let raw_candidates = detector::detect_candidates_with(&learnings, limits.max_candidates);
    let candidates = enforce_principle_limits(principles.len(), raw_candidates, &limits);

    let generated_at = Local::now();
    let report = EvaluationReport {
        principles: &principles,
        learnings: &learnings,
        evaluations: &evaluations,
        candidates: &candidates,
        generated_at,
        days_back: config.days_back,
    }
    .to_string();

    let summary = summarize(&evaluations, &candidates);
    info!(
        "Evaluation complete: {} active, {} under review, {} unused, {} candidates",
        summary.active, summary.under_review, summary.unused, summary.candidates
    );

    Ok(EvaluationOutcome {
        principles,
        learnings,
        evaluations,
        candidates,
        summary,
        generated_at,
        days_back: config.days_back,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CnsLayout::new(dir.path());

        let outcome = evaluate_principles(&layout, &EvaluationConfig::default()).unwrap();
        assert!(outcome.evaluations.is_empty());
        assert!(outcome.candidates.is_empty());
        assert!(!outcome.summary.needs_attention());
        assert!(outcome.report.contains("- **Active Principles**: 0"));
        assert!(outcome.report.contains("**Learnings Analyzed**: 0"));
    }

    #[test]
    fn test_summary_json_shape() {
        let summary = EvaluationSummary { active: 2, under_review: 1, unused: 0, candidates: 0 };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["under_review"], 1);
        assert!(summary.needs_attention());
    }
}
