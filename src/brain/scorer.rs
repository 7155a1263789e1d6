//! Evidence scoring - judges each principle against recent learnings
//!
//! A principle's keywords are the capitalized words of its body plus a few
//! known phrases. A learning that contains any keyword "mentions" the
//! principle; its insights that contain a keyword and a success or failure
//! phrase count as support or contradiction.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use super::extractor::Insight;
use crate::memory::{Confidence, LearningRecord, Principle};

/// Phrases that count as keywords whenever they appear in a principle body
const KEY_PHRASES: &[&str] = &[
    "source control",
    "change hygiene",
    "jira",
    "confluence",
    "secrets",
    "documentation",
];

const POSITIVE_INDICATORS: &[&str] = &["worked well", "successful", "improved", "effective", "better"];

const NEGATIVE_INDICATORS: &[&str] = &["failed", "didn't work", "problem", "issue", "worse"];

static CAPITALIZED_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z]+\b").expect("valid capitalized word regex")
});

/// Lifecycle verdict for a principle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Active,
    UnderReview,
    Unused,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationStatus::Active => "active",
            EvaluationStatus::UnderReview => "under_review",
            EvaluationStatus::Unused => "unused",
        }
    }
}

impl std::fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationStatus::Active => write!(f, "Active"),
            EvaluationStatus::UnderReview => write!(f, "Under Review"),
            EvaluationStatus::Unused => write!(f, "Unused"),
        }
    }
}

/// One learning's worth of evidence for or against a principle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Learning filename
    pub learning: String,
    /// Insights in that learning that touch the principle's keywords
    pub evidence: Vec<Insight>,
    /// Absolute support score
    pub strength: u32,
}

/// Verdict for one principle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub principle: Principle,
    pub status: EvaluationStatus,
    pub confidence: Confidence,
    pub supporting_evidence: Vec<EvidenceItem>,
    pub contradicting_evidence: Vec<EvidenceItem>,
    pub last_referenced: Option<DateTime<Utc>>,
}

impl Evaluation {
    /// Derive status and confidence from the collected evidence
    fn finalize(mut self) -> Self {
        let (status, confidence) = if !self.contradicting_evidence.is_empty() {
            (EvaluationStatus::UnderReview, Confidence::Medium)
        } else if self.supporting_evidence.is_empty() && self.last_referenced.is_none() {
            (EvaluationStatus::Unused, Confidence::Low)
        } else {
            (EvaluationStatus::Active, Confidence::High)
        };
        self.status = status;
        self.confidence = confidence;
        self
    }
}

/// Keywords of a principle: lowercased capitalized words of the body, plus
/// any key phrase present in it.
pub fn principle_keywords(principle: &Principle) -> BTreeSet<String> {
    let body = principle.body();
    let mut keywords: BTreeSet<String> = CAPITALIZED_WORD_RE
        .find_iter(&body)
        .map(|m| m.as_str().to_lowercase())
        .collect();

    let lower = body.to_lowercase();
    for phrase in KEY_PHRASES {
        if lower.contains(phrase) {
            keywords.insert(phrase.to_string());
        }
    }
    keywords
}

fn contains_any<'a>(text: &str, terms: impl IntoIterator<Item = &'a str>) -> bool {
    terms.into_iter().any(|t| text.contains(t))
}

fn touches(insight: &Insight, keywords: &BTreeSet<String>) -> bool {
    let lower = insight.text.to_lowercase();
    contains_any(&lower, keywords.iter().map(String::as_str))
}

/// Does the learning's text contain any of the keywords?
pub fn mentions(keywords: &BTreeSet<String>, learning: &LearningRecord) -> bool {
    let text = learning.raw_content.to_lowercase();
    contains_any(&text, keywords.iter().map(String::as_str))
}

/// Net support a learning lends a principle.
///
/// +1 per keyword-bearing insight with a success phrase, -1 per one with a
/// failure phrase (success is checked first).
pub fn support_score(keywords: &BTreeSet<String>, learning: &LearningRecord) -> i32 {
    learning
        .insights
        .iter()
        .filter(|insight| touches(insight, keywords))
        .map(|insight| {
            let lower = insight.text.to_lowercase();
            if contains_any(&lower, POSITIVE_INDICATORS.iter().copied()) {
                1
            } else if contains_any(&lower, NEGATIVE_INDICATORS.iter().copied()) {
                -1
            } else {
                0
            }
        })
        .sum()
}

/// Insights of a learning that relate to the principle
pub fn relevant_evidence(keywords: &BTreeSet<String>, learning: &LearningRecord) -> Vec<Insight> {
    learning
        .insights
        .iter()
        .filter(|insight| touches(insight, keywords))
        .cloned()
        .collect()
}

/// Evaluate every principle against the learnings
pub fn evaluate(principles: &[Principle], learnings: &[LearningRecord]) -> Vec<Evaluation> {
    principles
        .iter()
        .map(|principle| evaluate_one(principle, learnings))
        .collect()
}

fn evaluate_one(principle: &Principle, learnings: &[LearningRecord]) -> Evaluation {
    let keywords = principle_keywords(principle);
    debug!("Principle '{}' keywords: {:?}", principle.title, keywords);

    let mut evaluation = Evaluation {
        principle: principle.clone(),
        status: EvaluationStatus::Active,
        confidence: Confidence::High,
        supporting_evidence: Vec::new(),
        contradicting_evidence: Vec::new(),
        last_referenced: None,
    };

    for learning in learnings {
        if !mentions(&keywords, learning) {
            continue;
        }

        evaluation.last_referenced = Some(match evaluation.last_referenced {
            Some(seen) => seen.max(learning.date),
            None => learning.date,
        });

        let score = support_score(&keywords, learning);
        if score == 0 {
            continue;
        }

        let item = EvidenceItem {
            learning: learning.filename.clone(),
            evidence: relevant_evidence(&keywords, learning),
            strength: score.unsigned_abs(),
        };
        if score > 0 {
            evaluation.supporting_evidence.push(item);
        } else {
            evaluation.contradicting_evidence.push(item);
        }
    }

    evaluation.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ValidationStatus;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn principle(body: &[&str]) -> Principle {
        Principle {
            title: "1. Test Principle".to_string(),
            content_lines: body.iter().map(|s| s.to_string()).collect(),
            validation_status: ValidationStatus::Unknown,
            last_validated: None,
            confidence: Confidence::Unknown,
        }
    }

    fn learning(name: &str, day: u32, content: &str) -> LearningRecord {
        let date = Utc.with_ymd_and_hms(2025, 5, day, 12, 0, 0).unwrap();
        LearningRecord::from_content(name, PathBuf::from(name), content.to_string(), date)
    }

    #[test]
    fn test_principle_keywords() {
        let p = principle(&["Use Source Control and write documentation.", "Never skip Review"]);
        let keywords = principle_keywords(&p);
        let expected: BTreeSet<String> = ["use", "source", "control", "never", "review", "source control", "documentation"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(keywords, expected);
    }

    #[test]
    fn test_support_score_positive_checked_first() {
        let keywords: BTreeSet<String> = ["merge".to_string()].into_iter().collect();
        let l = learning(
            "learning-a.md",
            1,
            "## What Went Well\n- merge worked well despite one problem\n- merge had an issue\n- unrelated success\n",
        );
        // +1 (positive wins) -1 (negative) and the unrelated insight is ignored
        assert_eq!(support_score(&keywords, &l), 0);
        assert_eq!(relevant_evidence(&keywords, &l).len(), 2);
    }

    #[test]
    fn test_evaluate_contradiction_wins() {
        let p = principle(&["Follow Source Control rules for every Merge."]);
        let learnings = vec![
            learning("learning-1.md", 3, "## What Went Well\n- merge process worked well and was successful\n"),
            learning("learning-2.md", 2, "## What Went Well\n- merge process worked well and was successful\n"),
            learning("learning-3.md", 1, "## What Didn't Work\n- the merge had a problem\n"),
        ];

        let evaluations = evaluate(&[p], &learnings);
        let e = &evaluations[0];
        assert_eq!(e.status, EvaluationStatus::UnderReview);
        assert_eq!(e.confidence, Confidence::Medium);
        assert_eq!(e.supporting_evidence.len(), 2);
        assert_eq!(e.contradicting_evidence.len(), 1);
        assert_eq!(e.contradicting_evidence[0].learning, "learning-3.md");
        assert_eq!(e.contradicting_evidence[0].strength, 1);
        assert_eq!(e.last_referenced, Some(Utc.with_ymd_and_hms(2025, 5, 3, 12, 0, 0).unwrap()));
    }

    #[test]
    fn test_evaluate_mention_without_evidence_is_active() {
        let p = principle(&["Keep Secrets out of the repo."]);
        let learnings = vec![learning(
            "learning-1.md",
            1,
            "# Notes\nWe rotated secrets today.\n## Key Learning\n- rotation is tedious\n",
        )];
        let e = &evaluate(&[p], &learnings)[0];
        assert_eq!(e.status, EvaluationStatus::Active);
        assert_eq!(e.confidence, Confidence::High);
        assert!(e.supporting_evidence.is_empty());
        assert!(e.last_referenced.is_some());
    }

    #[test]
    fn test_evaluate_unused() {
        let p = principle(&["Prefer Kubernetes deployments."]);
        let learnings = vec![learning("learning-1.md", 1, "## Key Learning\n- merge worked well\n")];
        let e = &evaluate(&[p], &learnings)[0];
        assert_eq!(e.status, EvaluationStatus::Unused);
        assert_eq!(e.confidence, Confidence::Low);
        assert!(e.last_referenced.is_none());
    }
}
