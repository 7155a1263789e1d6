//! Evaluation report rendering

use chrono::{DateTime, Local, Utc};
use std::fmt;

use super::detector::Candidate;
use super::scorer::{Evaluation, EvaluationStatus, EvidenceItem};
use crate::memory::{LearningRecord, Principle};

/// Supporting evidence lines shown per principle
const MAX_SUPPORTING_SHOWN: usize = 2;

/// Everything needed to render a report. Rendering is pure: the timestamp
/// and analysis window are part of the input.
pub struct EvaluationReport<'a> {
    pub principles: &'a [Principle],
    pub learnings: &'a [LearningRecord],
    pub evaluations: &'a [Evaluation],
    pub candidates: &'a [Candidate],
    pub generated_at: DateTime<Local>,
    pub days_back: u32,
}

impl<'a> EvaluationReport<'a> {
    fn count(&self, status: EvaluationStatus) -> usize {
        self.evaluations.iter().filter(|e| e.status == status).count()
    }

    fn with_status(&self, status: EvaluationStatus) -> impl Iterator<Item = &Evaluation> {
        self.evaluations.iter().filter(move |e| e.status == status)
    }
}

fn first_insight<'e>(item: &'e EvidenceItem, fallback: &'e str) -> &'e str {
    item.evidence
        .first()
        .map(|i| i.text.as_str())
        .unwrap_or(fallback)
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl fmt::Display for EvaluationReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self.count(EvaluationStatus::Active);
        let review = self.count(EvaluationStatus::UnderReview);
        let unused = self.count(EvaluationStatus::Unused);

        writeln!(f, "# Prime Principle Evaluation Report")?;
        writeln!(f, "**Generated**: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "**Analysis Period**: Last {} days", self.days_back)?;
        writeln!(f, "**Principles Evaluated**: {}", self.principles.len())?;
        writeln!(f, "**Learnings Analyzed**: {}", self.learnings.len())?;
        writeln!(f)?;

        writeln!(f, "## Executive Summary")?;
        writeln!(f, "- **Active Principles**: {}", active)?;
        writeln!(f, "- **Under Review**: {}", review)?;
        writeln!(f, "- **Unused/Stale**: {}", unused)?;
        writeln!(f, "- **New Candidates**: {}", self.candidates.len())?;
        writeln!(f)?;

        writeln!(f, "## Principle Evaluations")?;
        writeln!(f)?;
        for evaluation in self.evaluations {
            writeln!(f, "### {}", evaluation.principle.title)?;
            writeln!(f, "**Status**: {}", evaluation.status)?;
            writeln!(f, "**Confidence**: {}", evaluation.confidence)?;
            match &evaluation.last_referenced {
                Some(date) => writeln!(f, "**Last Referenced**: {}", format_date(date))?,
                None => writeln!(f, "**Last Referenced**: Not found in recent learnings")?,
            }

            if !evaluation.supporting_evidence.is_empty() {
                writeln!(f, "**Supporting Evidence**: {} instances", evaluation.supporting_evidence.len())?;
                for item in evaluation.supporting_evidence.iter().take(MAX_SUPPORTING_SHOWN) {
                    writeln!(f, "  - {}: {}", item.learning, first_insight(item, "General support"))?;
                }
            }

            if !evaluation.contradicting_evidence.is_empty() {
                writeln!(f, "**Contradicting Evidence**: {} instances", evaluation.contradicting_evidence.len())?;
                for item in &evaluation.contradicting_evidence {
                    writeln!(f, "  - {}: {}", item.learning, first_insight(item, "General contradiction"))?;
                }
            }
            writeln!(f)?;
        }

        if !self.candidates.is_empty() {
            writeln!(f, "## New Principle Candidates")?;
            writeln!(f)?;
            for candidate in self.candidates {
                writeln!(f, "### Proposed: {} Principle", candidate.category.title())?;
                writeln!(f, "**Frequency**: {} occurrences", candidate.frequency)?;
                writeln!(f, "**Quality Score**: {}/100", candidate.quality_score)?;
                writeln!(f, "**Themes**: {}", candidate.themes.join(", "))?;
                writeln!(f, "**Proposed Text**: {}", candidate.proposed_text)?;
                writeln!(f, "**Supporting Examples**:")?;
                for example in &candidate.examples {
                    writeln!(f, "  - {}: {}", example.source_file, example.insight)?;
                }
                writeln!(f)?;
            }
        }

        writeln!(f, "## Recommendations")?;
        writeln!(f)?;

        if review > 0 {
            writeln!(f, "### Principles Requiring Review")?;
            for evaluation in self.with_status(EvaluationStatus::UnderReview) {
                writeln!(
                    f,
                    "- **{}**: Review conflicting evidence and update if necessary",
                    evaluation.principle.title
                )?;
            }
        }

        if unused > 0 {
            writeln!(f, "### Unused Principles")?;
            for evaluation in self.with_status(EvaluationStatus::Unused) {
                writeln!(
                    f,
                    "- **{}**: Consider deprecation or find opportunities to apply",
                    evaluation.principle.title
                )?;
            }
        }

        if !self.candidates.is_empty() {
            writeln!(f, "### New Principles to Consider")?;
            for candidate in self.candidates {
                writeln!(f, "- **{}**: {}", candidate.category.title(), candidate.proposed_text)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::detector::CandidateExample;
    use crate::brain::extractor::{Insight, InsightCategory};
    use crate::memory::{Confidence, ValidationStatus};
    use chrono::TimeZone;

    fn principle(title: &str) -> Principle {
        Principle {
            title: title.to_string(),
            content_lines: vec![],
            validation_status: ValidationStatus::Unknown,
            last_validated: None,
            confidence: Confidence::Unknown,
        }
    }

    fn evidence(file: &str, text: &str) -> EvidenceItem {
        EvidenceItem {
            learning: file.to_string(),
            evidence: vec![Insight {
                section: "key learning".to_string(),
                text: text.to_string(),
                category: InsightCategory::General,
            }],
            strength: 1,
        }
    }

    fn fixture() -> (Vec<Principle>, Vec<Evaluation>, Vec<Candidate>) {
        let principles = vec![principle("1. Reviewed"), principle("2. Forgotten"), principle("3. Healthy")];
        let evaluations = vec![
            Evaluation {
                principle: principles[0].clone(),
                status: EvaluationStatus::UnderReview,
                confidence: Confidence::Medium,
                supporting_evidence: vec![
                    evidence("learning-a.md", "a worked well"),
                    evidence("learning-b.md", "b worked well"),
                    evidence("learning-c.md", "c worked well"),
                ],
                contradicting_evidence: vec![evidence("learning-d.md", "d had a problem")],
                last_referenced: Some(Utc.with_ymd_and_hms(2025, 4, 2, 10, 0, 0).unwrap()),
            },
            Evaluation {
                principle: principles[1].clone(),
                status: EvaluationStatus::Unused,
                confidence: Confidence::Low,
                supporting_evidence: vec![],
                contradicting_evidence: vec![],
                last_referenced: None,
            },
            Evaluation {
                principle: principles[2].clone(),
                status: EvaluationStatus::Active,
                confidence: Confidence::High,
                supporting_evidence: vec![],
                contradicting_evidence: vec![],
                last_referenced: Some(Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap()),
            },
        ];
        let candidates = vec![Candidate {
            category: InsightCategory::Process,
            frequency: 6,
            themes: vec!["release".to_string(), "process".to_string()],
            examples: vec![CandidateExample {
                insight: "release process was predictable".to_string(),
                source_file: "learning-c.md".to_string(),
                date: Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap(),
            }],
            proposed_text: "Process Optimization: Streamline workflows and methodologies. Emphasize release, process.".to_string(),
            quality_score: 52,
        }];
        (principles, evaluations, candidates)
    }

    fn report_text() -> String {
        let (principles, evaluations, candidates) = fixture();
        EvaluationReport {
            principles: &principles,
            learnings: &[],
            evaluations: &evaluations,
            candidates: &candidates,
            generated_at: Local.with_ymd_and_hms(2025, 4, 3, 9, 0, 0).unwrap(),
            days_back: 90,
        }
        .to_string()
    }

    #[test]
    fn test_report_header_and_summary() {
        let text = report_text();
        assert!(text.starts_with("# Prime Principle Evaluation Report\n**Generated**: 2025-04-03 09:00:00\n"));
        assert!(text.contains("**Analysis Period**: Last 90 days"));
        assert!(text.contains("- **Active Principles**: 1"));
        assert!(text.contains("- **Under Review**: 1"));
        assert!(text.contains("- **Unused/Stale**: 1"));
        assert!(text.contains("- **New Candidates**: 1"));
    }

    #[test]
    fn test_report_evidence_limits() {
        let text = report_text();
        assert!(text.contains("**Status**: Under Review"));
        assert!(text.contains("**Supporting Evidence**: 3 instances"));
        assert!(text.contains("  - learning-a.md: a worked well"));
        assert!(text.contains("  - learning-b.md: b worked well"));
        assert!(!text.contains("learning-c.md: c worked well"));
        assert!(text.contains("  - learning-d.md: d had a problem"));
        assert!(text.contains("**Last Referenced**: 2025-04-02"));
        assert!(text.contains("**Last Referenced**: Not found in recent learnings"));
    }

    #[test]
    fn test_report_candidates_and_recommendations() {
        let text = report_text();
        assert!(text.contains("### Proposed: Process Principle"));
        assert!(text.contains("**Themes**: release, process"));
        assert!(text.contains("  - learning-c.md: release process was predictable"));
        assert!(text.contains("- **1. Reviewed**: Review conflicting evidence"));
        assert!(text.contains("- **2. Forgotten**: Consider deprecation"));
        assert!(text.contains("- **Process**: Process Optimization:"));
        assert!(!text.contains("**3. Healthy**:"));
    }

    #[test]
    fn test_report_is_deterministic() {
        assert_eq!(report_text(), report_text());
    }
}
