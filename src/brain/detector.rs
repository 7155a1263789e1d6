//! New principle candidate detection
//!
//! Insights are grouped by category across all learnings. A category that
//! recurs often enough, across enough files and time, and reads as a
//! behavioral pattern rather than tool trivia becomes a [`Candidate`].

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use super::extractor::InsightCategory;
use crate::memory::LearningRecord;

/// Minimum insights in a category before it is considered
const MIN_FREQUENCY: usize = 5;

/// Minimum distinct learning files behind a candidate
const MIN_DISTINCT_FILES: usize = 3;

/// Minimum time span covered by a candidate's insights
const MIN_SPAN_DAYS: i64 = 7;

const MAX_THEMES: usize = 5;

const MAX_EXAMPLES: usize = 3;

const THEME_STOPWORDS: &[&str] = &["that", "this", "with", "from", "they", "were", "been", "have"];

const SPECIFIC_TOOLS: &[&str] = &["jira", "confluence", "bitbucket", "vscode", "python", "javascript"];

/// Above this share of tool-specific insights a category is too narrow
const MAX_TOOL_SHARE: f64 = 0.7;

const BEHAVIORAL_INDICATORS: &[&str] = &["workflow", "process", "approach", "method", "pattern", "practice", "habit"];

/// Below this share of behavioral insights a category is mere technical detail
const MIN_BEHAVIORAL_SHARE: f64 = 0.3;

const FUNDAMENTAL_KEYWORDS: &[&str] = &["always", "never", "consistent", "systematic", "principle", "standard", "approach"];

static THEME_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\w{4,}\b").expect("valid theme word regex")
});

/// An insight quoted as evidence for a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateExample {
    pub insight: String,
    pub source_file: String,
    pub date: DateTime<Utc>,
}

/// A proposed new principle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub category: InsightCategory,
    pub frequency: usize,
    pub themes: Vec<String>,
    /// First few supporting insights, in discovery order
    pub examples: Vec<CandidateExample>,
    pub proposed_text: String,
    /// 0 to 100
    pub quality_score: u32,
}

/// Limits on how many principles may exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipleLimits {
    /// Soft maximum number of principles
    pub max_principles: usize,
    /// From this count on, only strict-quality candidates are kept
    pub warn_threshold: usize,
    /// Minimum quality score once past the warn threshold
    pub strict_quality_score: u32,
    /// Candidates surfaced per evaluation
    pub max_candidates: usize,
}

impl Default for PrincipleLimits {
    fn default() -> Self {
        Self {
            max_principles: 15,
            warn_threshold: 12,
            strict_quality_score: 80,
            max_candidates: 3,
        }
    }
}

/// Detect candidates with default limits (at most 3)
pub fn detect_candidates(learnings: &[LearningRecord]) -> Vec<Candidate> {
    detect_candidates_with(learnings, PrincipleLimits::default().max_candidates)
}

/// Detect up to `max_candidates`, highest quality first.
///
/// Equal scores keep category discovery order.
pub fn detect_candidates_with(learnings: &[LearningRecord], max_candidates: usize) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = group_by_category(learnings)
        .into_iter()
        .filter(|(_, examples)| examples.len() >= MIN_FREQUENCY)
        .filter_map(|(category, examples)| build_candidate(category, examples))
        .collect();

    // Stable sort keeps discovery order among equal scores
    candidates.sort_by(|a, b| b.quality_score.cmp(&a.quality_score));
    candidates.truncate(max_candidates);
    debug!("Detected {} principle candidates", candidates.len());
    candidates
}

/// All insights grouped by category, categories in first-seen order
fn group_by_category(learnings: &[LearningRecord]) -> Vec<(InsightCategory, Vec<CandidateExample>)> {
    let mut groups: Vec<(InsightCategory, Vec<CandidateExample>)> = Vec::new();

    for learning in learnings {
        for insight in &learning.insights {
            let example = CandidateExample {
                insight: insight.text.clone(),
                source_file: learning.filename.clone(),
                date: learning.date,
            };
            match groups.iter_mut().find(|(c, _)| *c == insight.category) {
                Some((_, examples)) => examples.push(example),
                None => groups.push((insight.category, vec![example])),
            }
        }
    }

    groups
}

fn build_candidate(category: InsightCategory, examples: Vec<CandidateExample>) -> Option<Candidate> {
    let themes = extract_common_themes(&examples);
    if themes.is_empty() {
        debug!("Category '{}' has no common themes", category);
        return None;
    }
    if !passes_quality_gates(&examples) {
        debug!("Category '{}' rejected by quality gates", category);
        return None;
    }

    let quality_score = quality_score(&examples, themes.len());
    let mut examples = examples;
    let frequency = examples.len();
    examples.truncate(MAX_EXAMPLES);

    Some(Candidate {
        category,
        frequency,
        proposed_text: proposal_text(category, &themes),
        themes,
        examples,
        quality_score,
    })
}

/// Words of 4+ characters (minus stopwords) seen at least twice, in the
/// order they were first encountered, at most five.
pub fn extract_common_themes(examples: &[CandidateExample]) -> Vec<String> {
    let all_text = examples
        .iter()
        .map(|e| e.insight.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for m in THEME_WORD_RE.find_iter(&all_text) {
        let word = m.as_str();
        if THEME_STOPWORDS.contains(&word) {
            continue;
        }
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    order
        .into_iter()
        .filter(|w| counts.get(w).copied().unwrap_or(0) >= 2)
        .take(MAX_THEMES)
        .map(str::to_string)
        .collect()
}

fn share_containing_any(texts: &[String], terms: &[&str]) -> f64 {
    if texts.is_empty() {
        return 0.0;
    }
    let hits = texts
        .iter()
        .filter(|t| terms.iter().any(|term| t.contains(term)))
        .count();
    hits as f64 / texts.len() as f64
}

fn distinct_files(examples: &[CandidateExample]) -> usize {
    examples
        .iter()
        .map(|e| e.source_file.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Apply all candidacy gates; every one must pass
pub fn passes_quality_gates(examples: &[CandidateExample]) -> bool {
    if examples.len() < MIN_FREQUENCY {
        return false;
    }

    if distinct_files(examples) < MIN_DISTINCT_FILES {
        return false;
    }

    let distinct_dates: HashSet<DateTime<Utc>> = examples.iter().map(|e| e.date).collect();
    if distinct_dates.len() >= 2 {
        let newest = examples.iter().map(|e| e.date).max();
        let oldest = examples.iter().map(|e| e.date).min();
        if let (Some(newest), Some(oldest)) = (newest, oldest) {
            if newest - oldest < Duration::days(MIN_SPAN_DAYS) {
                return false;
            }
        }
    }

    let texts: Vec<String> = examples.iter().map(|e| e.insight.to_lowercase()).collect();
    if share_containing_any(&texts, SPECIFIC_TOOLS) > MAX_TOOL_SHARE {
        return false;
    }
    if share_containing_any(&texts, BEHAVIORAL_INDICATORS) < MIN_BEHAVIORAL_SHARE {
        return false;
    }

    true
}

/// Quality score (0 to 100): four components capped at 25 points each
pub fn quality_score(examples: &[CandidateExample], theme_count: usize) -> u32 {
    let frequency = (examples.len() as u32).saturating_mul(3).min(25);
    let diversity = (distinct_files(examples) as u32).saturating_mul(5).min(25);

    let fundamental_hits: usize = examples
        .iter()
        .map(|e| {
            let lower = e.insight.to_lowercase();
            FUNDAMENTAL_KEYWORDS.iter().filter(|k| lower.contains(*k)).count()
        })
        .sum();
    let fundamentalness = (fundamental_hits as u32).saturating_mul(8).min(25);

    let theme_strength = (theme_count as u32).saturating_mul(3).min(25);

    frequency + diversity + fundamentalness + theme_strength
}

/// Proposed principle text for a category
pub fn proposal_text(category: InsightCategory, themes: &[String]) -> String {
    let theme_text = themes.join(", ");
    match category {
        InsightCategory::Interface => format!(
            "Interface Design and User Experience: Ensure clear, consistent interface patterns. Focus on {}.",
            theme_text
        ),
        InsightCategory::Architecture => format!(
            "System Architecture: Maintain clean, scalable architecture principles. Consider {}.",
            theme_text
        ),
        InsightCategory::Process => format!(
            "Process Optimization: Streamline workflows and methodologies. Emphasize {}.",
            theme_text
        ),
        InsightCategory::Startup => format!(
            "System Initialization: Ensure reliable, comprehensive startup procedures. Include {}.",
            theme_text
        ),
        InsightCategory::Context => format!(
            "Context Management: Maintain comprehensive context and continuity. Focus on {}.",
            theme_text
        ),
        InsightCategory::General => format!(
            "General Best Practice: Establish consistent patterns for {}.",
            theme_text
        ),
    }
}

/// Enforce the soft cap on the number of principles.
///
/// At the cap nothing is proposed; near it only strict-quality candidates
/// survive; the result never exceeds the remaining slots.
pub fn enforce_principle_limits(
    current_count: usize,
    candidates: Vec<Candidate>,
    limits: &PrincipleLimits,
) -> Vec<Candidate> {
    if current_count >= limits.max_principles {
        warn!(
            "Maximum principle limit reached ({}); consolidate or deprecate before adding new ones",
            limits.max_principles
        );
        return Vec::new();
    }

    let available = limits.max_principles - current_count;

    if current_count >= limits.warn_threshold {
        info!(
            "Approaching principle limit ({}/{}); applying stricter quality filter",
            current_count, limits.max_principles
        );
        return candidates
            .into_iter()
            .filter(|c| c.quality_score >= limits.strict_quality_score)
            .take(available)
            .collect();
    }

    candidates.into_iter().take(available).collect()
}
