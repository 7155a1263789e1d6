//! User pattern learning
//!
//! Scans recent learnings for recurring communication, workflow and quality
//! habits, turns the confident ones into suggested lines for
//! `user-patterns.md`, and applies whatever a [`SuggestionReviewer`] approves.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use tracing::{debug, info, warn};

use crate::config::PatternsConfig;
use crate::memory::episodic::{count_learnings, load_learnings_at};
use crate::memory::{read_optional, touch_last_updated, write_atomic, CancelFlag, CnsLayout};

const COMMUNICATION_INDICATORS: &[(&str, &[&str])] = &[
    ("concise", &["brief", "short", "concise", "direct", "minimal"]),
    ("detailed", &["detailed", "comprehensive", "thorough", "complete"]),
    ("technical", &["technical", "precise", "specific", "exact"]),
    ("collaborative", &["discuss", "review", "feedback", "collaborate"]),
];
const COMMUNICATION_MIN_HITS: usize = 3;

static WORKFLOW_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("step_by_step", r"step \d|first.*then|next.*step"),
        ("todo_driven", r"todo|task.*list|checklist"),
        ("testing_focused", r"test.*first|verify.*before|check.*that"),
        ("documentation_heavy", r"document.*this|add.*documentation|update.*docs"),
    ]
    .into_iter()
    .map(|(name, re)| (name, Regex::new(re).expect("valid workflow regex")))
    .collect()
});
const WORKFLOW_MIN_MATCHES: usize = 2;

static QUALITY_INDICATORS: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| {
    let standards: [(&str, &[&str]); 3] = [
        ("high_standards", &["green.*test", "lint.*check", "verify.*quality", "thorough.*review"]),
        ("security_conscious", &["secret", "security", "permission", "auth"]),
        ("performance_aware", &["performance", "optimize", "efficient", "fast"]),
    ];
    standards
        .into_iter()
        .map(|(name, patterns)| {
            let regexes = patterns
                .iter()
                .map(|p| Regex::new(p).expect("valid quality regex"))
                .collect();
            (name, regexes)
        })
        .collect()
});
const QUALITY_MIN_HITS: usize = 2;

const MIN_AVERAGE_CONFIDENCE: f64 = 0.3;
const MIN_OCCURRENCES: usize = 3;
const MAX_PATTERNS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternCategory {
    Communication,
    Workflow,
    Quality,
}

impl std::fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternCategory::Communication => write!(f, "communication"),
            PatternCategory::Workflow => write!(f, "workflow"),
            PatternCategory::Quality => write!(f, "quality"),
        }
    }
}

/// A habit spotted in a single learning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub category: PatternCategory,
    pub pattern: String,
    pub confidence: f64,
    pub evidence: String,
    pub timestamp: DateTime<Utc>,
}

/// A habit seen across several learnings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPattern {
    pub category: PatternCategory,
    pub pattern: String,
    /// Average confidence over all occurrences
    pub confidence: f64,
    pub occurrences: usize,
    pub evidence: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// A proposed addition to one section of `user-patterns.md`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub section: String,
    pub addition: String,
    pub confidence: f64,
    pub rationale: String,
}

/// What the reviewer decided about one suggestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
    /// Approve with replacement text
    Edit(String),
    /// Stop reviewing; nothing further is approved
    SkipAll,
}

/// Decides which suggestions get written
#[cfg_attr(test, mockall::automock)]
pub trait SuggestionReviewer {
    fn review(&mut self, suggestion: &Suggestion, position: usize, total: usize) -> Result<ReviewDecision>;
}

/// Approves everything (non-interactive runs)
pub struct AutoApprove;

impl SuggestionReviewer for AutoApprove {
    fn review(&mut self, _suggestion: &Suggestion, _position: usize, _total: usize) -> Result<ReviewDecision> {
        Ok(ReviewDecision::Approve)
    }
}

/// Prompts on stdin for each suggestion
pub struct TerminalReviewer;

impl SuggestionReviewer for TerminalReviewer {
    fn review(&mut self, suggestion: &Suggestion, position: usize, total: usize) -> Result<ReviewDecision> {
        if position == 1 {
            println!();
            println!("CNS PATTERN RECOGNITION");
            println!("{}", "=".repeat(50));
            println!("Recent learnings show some recurring habits.");
            println!("Review each one before it is added to your user patterns.");
            println!();
        }

        println!("Pattern {}/{}: {}", position, total, suggestion.section);
        println!("   Suggested Addition: {}", suggestion.addition);
        println!("   Confidence: {:.0}%", suggestion.confidence * 100.0);
        println!("   Rationale: {}", suggestion.rationale);
        println!();

        loop {
            print!("   Add this pattern? [y]es / [n]o / [e]dit / [s]kip all: ");
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            let input = input.trim().to_lowercase();

            match input.as_str() {
                "y" | "yes" => return Ok(ReviewDecision::Approve),
                "n" | "no" => return Ok(ReviewDecision::Reject),
                "e" | "edit" => {
                    print!("   Enter your preferred version: ");
                    io::stdout().flush()?;
                    let mut text = String::new();
                    io::stdin().read_line(&mut text)?;
                    return Ok(ReviewDecision::Edit(text.trim().to_string()));
                }
                "s" | "skip" | "skip all" => return Ok(ReviewDecision::SkipAll),
                _ => {
                    println!("   Invalid option. Please enter y, n, e, or s.");
                }
            }
        }
    }
}

/// Outcome of a pattern learning pass
#[derive(Debug, Clone, PartialEq)]
pub enum PatternLearningOutcome {
    /// Established workspace; learning only runs on new ones unless forced
    Skipped,
    NoPatterns,
    NoSuggestions,
    NoneApproved,
    Applied(usize),
}

impl std::fmt::Display for PatternLearningOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternLearningOutcome::Skipped => write!(f, "Established workspace, pattern learning skipped"),
            PatternLearningOutcome::NoPatterns => write!(f, "No new user patterns detected"),
            PatternLearningOutcome::NoSuggestions => write!(f, "Patterns detected but none actionable"),
            PatternLearningOutcome::NoneApproved => write!(f, "No suggestions approved"),
            PatternLearningOutcome::Applied(n) => write!(f, "Added {} patterns to user-patterns.md", n),
        }
    }
}

/// Does this look like a fresh install?
///
/// True when `cns/` is younger than `new_workspace_days`, or episodic memory
/// holds fewer than `min_learning_files` files.
pub fn is_new_workspace(layout: &CnsLayout, config: &PatternsConfig, now: DateTime<Utc>) -> bool {
    let cns_dir = layout.cns_dir();
    if let Ok(meta) = std::fs::metadata(&cns_dir) {
        if let Ok(created) = meta.created().or_else(|_| meta.modified()) {
            let age = now - DateTime::<Utc>::from(created);
            if age < Duration::days(i64::from(config.new_workspace_days)) {
                debug!("CNS directory is {} hours old", age.num_hours());
                return true;
            }
        }
    }

    layout.episodic_dir().exists() && count_learnings(layout) < config.min_learning_files
}

/// Habits spotted in one learning's content
pub fn extract_patterns(content: &str, timestamp: DateTime<Utc>) -> Vec<DetectedPattern> {
    let mut patterns = Vec::new();
    let lower = content.to_lowercase();
    let lines: Vec<&str> = lower.lines().collect();

    for (style, indicators) in COMMUNICATION_INDICATORS {
        let count: usize = lines
            .iter()
            .map(|line| indicators.iter().filter(|i| line.contains(*i)).count())
            .sum();
        if count >= COMMUNICATION_MIN_HITS {
            patterns.push(DetectedPattern {
                category: PatternCategory::Communication,
                pattern: format!("prefers_{}_communication", style),
                confidence: (count as f64 / 10.0).min(1.0),
                evidence: format!("Used {} communication indicators {} times", style, count),
                timestamp,
            });
        }
    }

    for (name, regex) in WORKFLOW_PATTERNS.iter() {
        let matches = regex.find_iter(&lower).count();
        if matches >= WORKFLOW_MIN_MATCHES {
            patterns.push(DetectedPattern {
                category: PatternCategory::Workflow,
                pattern: name.to_string(),
                confidence: (matches as f64 / 5.0).min(1.0),
                evidence: format!("Found {} instances of {} behavior", matches, name),
                timestamp,
            });
        }
    }

    for (standard, regexes) in QUALITY_INDICATORS.iter() {
        let count: usize = lines
            .iter()
            .map(|line| regexes.iter().filter(|re| re.is_match(line)).count())
            .sum();
        if count >= QUALITY_MIN_HITS {
            patterns.push(DetectedPattern {
                category: PatternCategory::Quality,
                pattern: standard.to_string(),
                confidence: (count as f64 / 4.0).min(1.0),
                evidence: format!("Demonstrated {} in {} instances", standard, count),
                timestamp,
            });
        }
    }

    patterns
}

/// Merge per-learning detections into confident recurring patterns.
///
/// Keeps patterns seen at least three times with an average confidence of
/// 0.3 or more, most confident first, at most five.
pub fn consolidate_patterns(detected: Vec<DetectedPattern>) -> Vec<UserPattern> {
    let mut merged: Vec<UserPattern> = Vec::new();

    for d in detected {
        match merged
            .iter_mut()
            .find(|p| p.category == d.category && p.pattern == d.pattern)
        {
            Some(p) => {
                // Running total, averaged below
                p.confidence += d.confidence;
                p.occurrences += 1;
                p.evidence.push(d.evidence);
                p.first_seen = p.first_seen.min(d.timestamp);
                p.last_seen = p.last_seen.max(d.timestamp);
            }
            None => merged.push(UserPattern {
                category: d.category,
                pattern: d.pattern,
                confidence: d.confidence,
                occurrences: 1,
                evidence: vec![d.evidence],
                first_seen: d.timestamp,
                last_seen: d.timestamp,
            }),
        }
    }

    let mut patterns: Vec<UserPattern> = merged
        .into_iter()
        .map(|mut p| {
            p.confidence /= p.occurrences as f64;
            p
        })
        .filter(|p| p.confidence >= MIN_AVERAGE_CONFIDENCE && p.occurrences >= MIN_OCCURRENCES)
        .collect();

    patterns.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    patterns.truncate(MAX_PATTERNS);
    patterns
}

/// Recurring patterns across learnings from the last `days_back` days
pub fn analyze_recent_interactions(
    layout: &CnsLayout,
    days_back: u32,
    now: DateTime<Utc>,
) -> Result<Vec<UserPattern>> {
    let detected = load_learnings_at(layout, days_back, now)?
        .iter()
        .flat_map(|l| extract_patterns(&l.raw_content, l.date))
        .collect();
    Ok(consolidate_patterns(detected))
}

/// Turn patterns into concrete `user-patterns.md` additions.
///
/// Only patterns with a known wording produce a suggestion.
pub fn generate_suggestions(patterns: &[UserPattern]) -> Vec<Suggestion> {
    patterns
        .iter()
        .filter_map(|p| {
            let (section, addition, detected) = match (p.category, p.pattern.as_str()) {
                (PatternCategory::Communication, "prefers_concise_communication") => (
                    "Communication Preferences",
                    "- **Response Style**: Prefers concise, direct responses without verbose explanations",
                    "concise communication preference",
                ),
                (PatternCategory::Communication, "prefers_technical_communication") => (
                    "Communication Preferences",
                    "- **Technical Detail**: Prefers precise technical language and specific implementation details",
                    "technical communication preference",
                ),
                (PatternCategory::Workflow, "todo_driven") => (
                    "Workflow Patterns",
                    "- **Task Management**: Strongly prefers structured todo lists and step-by-step tracking",
                    "todo-driven workflow",
                ),
                (PatternCategory::Workflow, "testing_focused") => (
                    "Workflow Patterns",
                    "- **Quality Assurance**: Always verify and test before proceeding to next steps",
                    "testing-first approach",
                ),
                (PatternCategory::Quality, "high_standards") => (
                    "Project Preferences",
                    "- **Quality Gates**: Insists on green tests, lint checks, and thorough reviews",
                    "high quality standards",
                ),
                _ => return None,
            };
            Some(Suggestion {
                section: section.to_string(),
                addition: addition.to_string(),
                confidence: p.confidence,
                rationale: format!("Detected {} with {:.0}% confidence", detected, p.confidence * 100.0),
            })
        })
        .collect()
}

/// Walk suggestions through a reviewer, collecting the approved ones
pub fn review_suggestions(
    suggestions: Vec<Suggestion>,
    reviewer: &mut dyn SuggestionReviewer,
) -> Result<Vec<Suggestion>> {
    let total = suggestions.len();
    let mut approved = Vec::new();

    for (i, mut suggestion) in suggestions.into_iter().enumerate() {
        match reviewer.review(&suggestion, i + 1, total)? {
            ReviewDecision::Approve => approved.push(suggestion),
            ReviewDecision::Reject => debug!("Suggestion for '{}' rejected", suggestion.section),
            ReviewDecision::Edit(text) if text.trim().is_empty() => {
                debug!("Empty edit for '{}', discarded", suggestion.section);
            }
            ReviewDecision::Edit(text) => {
                suggestion.addition = text.trim().to_string();
                approved.push(suggestion);
            }
            ReviewDecision::SkipAll => break,
        }
    }

    Ok(approved)
}

/// Insert `addition` at the end of the `## <section>` block.
///
/// Returns `None` when the section heading is absent.
fn insert_into_section(content: &str, section: &str, addition: &str) -> Option<String> {
    let heading = format!("## {}", section);
    let mut lines: Vec<&str> = content.split('\n').collect();
    let start = lines.iter().position(|l| l.trim() == heading)?;

    let mut insert_at = lines[start + 1..]
        .iter()
        .position(|l| l.starts_with("## "))
        .map(|offset| start + 1 + offset)
        .unwrap_or(lines.len());
    while insert_at > start + 1 && lines[insert_at - 1].trim().is_empty() {
        insert_at -= 1;
    }

    lines.insert(insert_at, addition);
    Some(lines.join("\n"))
}

/// Write approved suggestions into `user-patterns.md`.
///
/// Returns how many were applied. A missing document or unknown section is
/// logged and skipped. Nothing is written once `cancel` is set.
pub fn apply_pattern_updates(
    layout: &CnsLayout,
    approved: &[Suggestion],
    now: DateTime<Utc>,
    cancel: &CancelFlag,
) -> Result<usize> {
    if approved.is_empty() {
        return Ok(0);
    }

    let path = layout.user_patterns_path();
    let Some(mut content) = read_optional(&path)? else {
        warn!("{} not found, pattern updates not applied", path.display());
        return Ok(0);
    };

    let mut applied = 0;
    for suggestion in approved {
        match insert_into_section(&content, &suggestion.section, &suggestion.addition) {
            Some(updated) => {
                content = updated;
                applied += 1;
            }
            None => warn!("Section '{}' not found in user-patterns.md", suggestion.section),
        }
    }

    cancel.check("updating user-patterns.md")?;
    write_atomic(&path, &touch_last_updated(&content, now))?;
    info!("Updated user-patterns.md with {} new patterns", applied);
    Ok(applied)
}

/// Full pass: detect, suggest, review, apply.
///
/// Established workspaces are skipped unless `force` is set.
pub fn learn_user_patterns(
    layout: &CnsLayout,
    config: &PatternsConfig,
    reviewer: &mut dyn SuggestionReviewer,
    force: bool,
    cancel: &CancelFlag,
) -> Result<PatternLearningOutcome> {
    let now = Utc::now();
    if !force && !is_new_workspace(layout, config, now) {
        return Ok(PatternLearningOutcome::Skipped);
    }

    info!("Analyzing user behavior patterns");
    let patterns = analyze_recent_interactions(layout, config.days_back, now)?;
    if patterns.is_empty() {
        return Ok(PatternLearningOutcome::NoPatterns);
    }

    let suggestions = generate_suggestions(&patterns);
    if suggestions.is_empty() {
        return Ok(PatternLearningOutcome::NoSuggestions);
    }

    let approved = review_suggestions(suggestions, reviewer)?;
    if approved.is_empty() {
        return Ok(PatternLearningOutcome::NoneApproved);
    }

    let applied = apply_pattern_updates(layout, &approved, now, cancel)?;
    Ok(PatternLearningOutcome::Applied(applied))
}
