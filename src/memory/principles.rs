//! Prime principles document
//!
//! One principle per `### <n>. <title>` heading; a block runs until the next
//! numbered heading, so later `#`/`##` sections land in the last principle's
//! body. Recognized metadata lines (`**Validation Status**`,
//! `**Last Validated**`, `**Confidence**`) fill the record; other non-empty
//! lines that are not `**` fields or `---` rules become body content.

use anyhow::Result;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::CnsLayout;

/// Validation state recorded in the principles document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Unknown,
    Validated,
    UnderReview,
    Deprecated,
    Other(String),
}

impl ValidationStatus {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "" | "unknown" => ValidationStatus::Unknown,
            "validated" | "active" => ValidationStatus::Validated,
            "under review" | "under_review" => ValidationStatus::UnderReview,
            "deprecated" => ValidationStatus::Deprecated,
            _ => ValidationStatus::Other(value.trim().to_string()),
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationStatus::Unknown => write!(f, "Unknown"),
            ValidationStatus::Validated => write!(f, "Validated"),
            ValidationStatus::UnderReview => write!(f, "Under Review"),
            ValidationStatus::Deprecated => write!(f, "Deprecated"),
            ValidationStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Confidence level, shared by principles and their evaluations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Unknown,
    Low,
    Medium,
    High,
}

impl Confidence {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            "low" => Confidence::Low,
            _ => Confidence::Unknown,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Unknown => write!(f, "Unknown"),
            Confidence::Low => write!(f, "Low"),
            Confidence::Medium => write!(f, "Medium"),
            Confidence::High => write!(f, "High"),
        }
    }
}

/// A named behavioral rule parsed from the principles document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principle {
    /// Heading text, e.g. `1. Source Control Discipline`
    pub title: String,
    pub content_lines: Vec<String>,
    pub validation_status: ValidationStatus,
    pub last_validated: Option<NaiveDate>,
    pub confidence: Confidence,
}

impl Principle {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            content_lines: Vec::new(),
            validation_status: ValidationStatus::Unknown,
            last_validated: None,
            confidence: Confidence::Unknown,
        }
    }

    /// Body content joined into a single line of text
    pub fn body(&self) -> String {
        self.content_lines.join(" ")
    }
}

static PRINCIPLE_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^###\s+\d+\.\s+\S").expect("valid principle heading regex")
});

/// Parse principles from markdown content
pub fn parse_principles(content: &str) -> Vec<Principle> {
    let mut principles = Vec::new();
    let mut current: Option<Principle> = None;

    for line in content.lines() {
        if PRINCIPLE_HEADING_RE.is_match(line) {
            if let Some(done) = current.take() {
                principles.push(done);
            }
            let title = line.trim_start_matches('#').trim();
            current = Some(Principle::new(title));
            continue;
        }

        let Some(principle) = current.as_mut() else {
            continue;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(value) = line.strip_prefix("**Validation Status**:") {
            principle.validation_status = ValidationStatus::parse(value);
        } else if let Some(value) = line.strip_prefix("**Last Validated**:") {
            principle.last_validated = parse_date_prefix(value);
        } else if let Some(value) = line.strip_prefix("**Confidence**:") {
            principle.confidence = Confidence::parse(value);
        } else if !line.starts_with("**") && trimmed != "---" {
            principle.content_lines.push(trimmed.to_string());
        }
    }

    if let Some(done) = current {
        principles.push(done);
    }

    let mut seen = HashSet::new();
    for principle in &principles {
        if !seen.insert(principle.title.as_str()) {
            warn!("Duplicate principle title: {}", principle.title);
        }
    }

    principles
}

/// Load principles from `cns/brain/prime-principles.md`.
///
/// A missing document yields an empty list.
pub fn load_principles(layout: &CnsLayout) -> Result<Vec<Principle>> {
    let path = layout.principles_path();
    let Some(content) = super::read_optional(&path)? else {
        debug!("No principles document at {}", path.display());
        return Ok(Vec::new());
    };
    let principles = parse_principles(&content);
    debug!("Loaded {} principles from {}", principles.len(), path.display());
    Ok(principles)
}

fn parse_date_prefix(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let prefix = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# Prime Principles\n\
\n\
## Core\n\
\n\
### 1. Source Control Discipline\n\
**Validation Status**: Validated\n\
**Last Validated**: 2025-01-15\n\
**Confidence**: High\n\
\n\
Always use Source Control for every change.\n\
Keep Change Hygiene in mind.\n\
\n\
---\n\
\n\
### 2. Documentation First\n\
Write documentation before code.\n\
**Note**: ignored field\n\
\n\
### Not numbered heading\n\
\n\
## Appendix\n\
This line belongs to no principle.\n";

    #[test]
    fn test_parse_principles_count_matches_numbered_headings() {
        let principles = parse_principles(DOC);
        assert_eq!(principles.len(), 2);
        assert_eq!(principles[0].title, "1. Source Control Discipline");
        assert_eq!(principles[1].title, "2. Documentation First");
    }

    #[test]
    fn test_parse_principle_metadata() {
        let principles = parse_principles(DOC);
        let first = &principles[0];
        assert_eq!(first.validation_status, ValidationStatus::Validated);
        assert_eq!(first.last_validated, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert_eq!(first.confidence, Confidence::High);
        assert_eq!(
            first.content_lines,
            vec![
                "Always use Source Control for every change.".to_string(),
                "Keep Change Hygiene in mind.".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_principle_defaults_and_body() {
        let principles = parse_principles(DOC);
        let second = &principles[1];
        assert_eq!(second.validation_status, ValidationStatus::Unknown);
        assert_eq!(second.confidence, Confidence::Unknown);
        assert!(second.last_validated.is_none());
        // Only a numbered heading closes a block
        assert_eq!(
            second.body(),
            "Write documentation before code. ### Not numbered heading ## Appendix This line belongs to no principle."
        );
    }

    #[test]
    fn test_trailing_section_joins_last_principle() {
        let principles = parse_principles(
            "### 1. Source Control\nUse branches.\n\n## Evaluation Framework\nReview Quarterly with Jira.\n",
        );
        assert_eq!(principles.len(), 1);
        assert_eq!(
            principles[0].content_lines,
            vec![
                "Use branches.".to_string(),
                "## Evaluation Framework".to_string(),
                "Review Quarterly with Jira.".to_string(),
            ]
        );
    }

    #[test]
    fn test_load_principles_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CnsLayout::new(dir.path());
        assert!(load_principles(&layout).unwrap().is_empty());
    }
}
