//! Episodic memory - one markdown file per captured learning
//!
//! Files live under `cns/memory/episodic/` and are named
//! `learning-YYYY-MM-DD-<suffix>.md`. Each file's modification time is the
//! learning's date.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{modified_at, write_atomic, CnsLayout};
use crate::brain::extractor::{extract_insights, Insight};

/// Terms that tie a learning to an area governed by principles
const PRINCIPLE_REFERENCE_TERMS: &[&str] = &[
    "source control",
    "ci",
    "pr",
    "merge",
    "change hygiene",
    "commit",
    "changelog",
    "jira",
    "confluence",
    "integration",
    "methodology",
    "documentation",
    "secrets",
    "safety",
    "security",
    "context continuity",
    "session",
    "self-evaluation",
    "learning",
];

/// A learning file loaded from episodic memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningRecord {
    pub filename: String,
    pub file_path: PathBuf,
    pub raw_content: String,
    /// File modification time
    pub date: DateTime<Utc>,
    pub activity: String,
    pub insights: Vec<Insight>,
    pub principle_references: Vec<String>,
}

impl LearningRecord {
    /// Build a record from file content. Pure; no filesystem access.
    pub fn from_content(
        filename: &str,
        file_path: PathBuf,
        raw_content: String,
        date: DateTime<Utc>,
    ) -> Self {
        let insights = extract_insights(&raw_content);
        let principle_references = find_principle_references(&raw_content);
        Self {
            filename: filename.to_string(),
            file_path,
            activity: activity_from_filename(filename),
            raw_content,
            date,
            insights,
            principle_references,
        }
    }
}

/// Is this a learning file name (`learning-*.md`)?
pub fn is_learning_filename(name: &str) -> bool {
    name.starts_with("learning-") && name.ends_with(".md")
}

/// Load learnings modified within the last `days_back` days, newest first
pub fn load_learnings(layout: &CnsLayout, days_back: u32) -> Result<Vec<LearningRecord>> {
    load_learnings_at(layout, days_back, Utc::now())
}

/// Same as [`load_learnings`] with an explicit "now"
pub fn load_learnings_at(
    layout: &CnsLayout,
    days_back: u32,
    now: DateTime<Utc>,
) -> Result<Vec<LearningRecord>> {
    let dir = layout.episodic_dir();
    if !dir.exists() {
        debug!("No episodic directory at {}", dir.display());
        return Ok(Vec::new());
    }

    let cutoff = now - Duration::days(i64::from(days_back));
    let mut learnings = Vec::new();

    for path in learning_files(&dir)? {
        match load_one(&path, cutoff) {
            Ok(Some(record)) => learnings.push(record),
            Ok(None) => {}
            Err(e) => warn!("Skipping learning file {}: {:#}", path.display(), e),
        }
    }

    learnings.sort_by(|a, b| b.date.cmp(&a.date));
    debug!("Loaded {} learnings from {}", learnings.len(), dir.display());
    Ok(learnings)
}

fn load_one(path: &Path, cutoff: DateTime<Utc>) -> Result<Option<LearningRecord>> {
    let date = modified_at(path)?;
    if date < cutoff {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Some(LearningRecord::from_content(&filename, path.to_path_buf(), content, date)))
}

/// All `learning-*.md` paths in a directory (unsorted)
fn learning_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let name = entry.file_name();
        if is_learning_filename(&name.to_string_lossy()) {
            files.push(entry.path());
        }
    }
    Ok(files)
}

/// Count markdown files in episodic memory, excluding templates
pub fn count_learnings(layout: &CnsLayout) -> usize {
    let dir = layout.episodic_dir();
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_lowercase();
            name.ends_with(".md") && !name.contains("template")
        })
        .count()
}

/// Activity name from a learning filename.
///
/// `learning-2025-01-02-db-migration.md` gives `db-migration`; names outside
/// that pattern are title-cased.
pub fn activity_from_filename(filename: &str) -> String {
    let stem = filename.strip_suffix(".md").unwrap_or(filename);
    if stem.starts_with("learning-") {
        let parts: Vec<&str> = stem.split('-').collect();
        if parts.len() >= 4 {
            return parts[4.min(parts.len())..].join("-");
        }
    }

    stem.split('-')
        .filter(|w| !w.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Principle-area terms present in a learning
pub fn find_principle_references(content: &str) -> Vec<String> {
    let lower = content.to_lowercase();
    PRINCIPLE_REFERENCE_TERMS
        .iter()
        .filter(|term| lower.contains(*term))
        .map(|term| term.to_string())
        .collect()
}

/// Capture a "Learn this:" entry as a new episodic learning file.
///
/// Returns the path of the created file.
pub fn record_learning(layout: &CnsLayout, content: &str, now: DateTime<Local>) -> Result<PathBuf> {
    let filename = format!("learning-{}.md", now.format("%Y-%m-%d-%H%M%S"));
    let path = layout.episodic_dir().join(filename);
    let timestamp = now.format("%Y-%m-%d %H:%M:%S");

    let document = format!(
        "# Critical Learning Captured\n\
         **Timestamp**: {timestamp}\n\
         **Source**: User \"Learn this:\" command\n\
         **Priority**: Critical\n\
         \n\
         ## Learning Content\n\
         {content}\n\
         \n\
         ## Integration Status\n\
         - Documented in episodic memory\n\
         - Added to best practices\n\
         \n\
         ## Application Scope\n\
         This learning applies to all future sessions and similar scenarios across projects.\n"
    );

    write_atomic(&path, &document)?;
    info!("Recorded learning at {}", path.display());
    Ok(path)
}

/// One-line digest of a recent learning, for the startup banner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningSummary {
    pub timestamp: String,
    pub summary: String,
    pub file: String,
}

/// The newest `limit` learnings (by filename), summarized
pub fn recent_summaries(layout: &CnsLayout, limit: usize) -> Vec<LearningSummary> {
    let dir = layout.episodic_dir();
    let mut files = match learning_files(&dir) {
        Ok(files) => files,
        Err(_) => return Vec::new(),
    };
    files.retain(|p| !p.to_string_lossy().to_lowercase().contains("template"));
    files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    files
        .into_iter()
        .take(limit)
        .filter_map(|path| {
            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    return None;
                }
            };
            let file = path.file_name()?.to_string_lossy().into_owned();
            let summary = summarize_learning(&content);
            Some(LearningSummary {
                timestamp: timestamp_from_filename(&file),
                summary: if summary.is_empty() { "Learning captured".to_string() } else { summary },
                file,
            })
        })
        .collect()
}

/// `learning-2025-12-23-233928.md` gives `2025-12-23 23:39:28`
pub fn timestamp_from_filename(filename: &str) -> String {
    let stem = filename
        .strip_suffix(".md")
        .unwrap_or(filename)
        .replacen("learning-", "", 1);
    let parts: Vec<&str> = stem.split('-').collect();
    if parts.len() < 4 {
        return "Unknown time".to_string();
    }

    let date = format!("{}-{}-{}", parts[0], parts[1], parts[2]);
    let time = parts[3];
    if time.len() == 6 && time.chars().all(|c| c.is_ascii_digit()) {
        format!("{} {}:{}:{}", date, &time[..2], &time[2..4], &time[4..6])
    } else {
        date
    }
}

/// First meaningful sentence of the `## Learning Content` section
pub fn summarize_learning(content: &str) -> String {
    let mut capture = false;
    let mut lines = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed == "## Learning Content" {
            capture = true;
            continue;
        }
        if capture && trimmed.starts_with("##") {
            break;
        }
        if capture && !trimmed.is_empty() && !line.starts_with("**") {
            lines.push(trimmed);
        }
    }

    if !lines.is_empty() {
        let joined = lines
            .join(" ")
            .replace("**", "")
            .replace('*', "")
            .replace("- ", "")
            .replace("1. ", "")
            .replace("2. ", "")
            .replace("3. ", "");
        let text = joined.split_whitespace().collect::<Vec<_>>().join(" ");

        if let Some(end) = text.find(". ") {
            if end > 30 && end < 150 {
                return text[..=end].to_string();
            }
        }
        if text.chars().count() > 120 {
            let head: String = text.chars().take(120).collect();
            return format!("{}...", head);
        }
        return text;
    }

    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with("**"))
        .map(|l| l.chars().take(120).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::{Duration as StdDuration, SystemTime};

    fn write_with_age(dir: &Path, name: &str, content: &str, days_old: u64) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        let mtime = SystemTime::now() - StdDuration::from_secs(days_old * 86_400);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    #[test]
    fn test_activity_from_filename() {
        assert_eq!(activity_from_filename("learning-2025-01-02-db-migration.md"), "db-migration");
        assert_eq!(activity_from_filename("learning-2025-01-02.md"), "");
        assert_eq!(activity_from_filename("weekly-retro.md"), "Weekly Retro");
    }

    #[test]
    fn test_timestamp_from_filename() {
        assert_eq!(timestamp_from_filename("learning-2025-12-23-233928.md"), "2025-12-23 23:39:28");
        assert_eq!(timestamp_from_filename("learning-2025-12-23-deploy.md"), "2025-12-23");
        assert_eq!(timestamp_from_filename("learning-misc.md"), "Unknown time");
    }

    #[test]
    fn test_find_principle_references() {
        let refs = find_principle_references("We fixed the Merge conflict and updated Documentation.");
        assert!(refs.contains(&"merge".to_string()));
        assert!(refs.contains(&"documentation".to_string()));
        assert!(!refs.contains(&"jira".to_string()));
    }

    #[test]
    fn test_load_learnings_filters_by_age_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CnsLayout::new(dir.path());
        let episodic = layout.episodic_dir();
        std::fs::create_dir_all(&episodic).unwrap();

        write_with_age(&episodic, "learning-recent.md", "## Key Learning\n- fresh insight\n", 1);
        write_with_age(&episodic, "learning-older.md", "## Key Learning\n- older insight\n", 10);
        write_with_age(&episodic, "learning-stale.md", "## Key Learning\n- stale\n", 120);
        write_with_age(&episodic, "notes.md", "## Key Learning\n- not a learning\n", 1);

        let learnings = load_learnings(&layout, 90).unwrap();
        let names: Vec<&str> = learnings.iter().map(|l| l.filename.as_str()).collect();
        assert_eq!(names, vec!["learning-recent.md", "learning-older.md"]);
        assert_eq!(learnings[0].insights.len(), 1);
        assert_eq!(learnings[0].insights[0].text, "fresh insight");
    }

    #[test]
    fn test_unreadable_learning_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CnsLayout::new(dir.path());
        let episodic = layout.episodic_dir();
        std::fs::create_dir_all(&episodic).unwrap();

        std::fs::write(episodic.join("learning-bad.md"), b"\xff\xfe\x00").unwrap();
        write_with_age(&episodic, "learning-ok.md", "## Key Learning\n- readable\n", 1);

        let learnings = load_learnings(&layout, 90).unwrap();
        let names: Vec<&str> = learnings.iter().map(|l| l.filename.as_str()).collect();
        assert_eq!(names, vec!["learning-ok.md"]);
    }

    #[test]
    fn test_cutoff_boundary_is_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CnsLayout::new(dir.path());
        let episodic = layout.episodic_dir();
        std::fs::create_dir_all(&episodic).unwrap();

        let edge = SystemTime::UNIX_EPOCH + StdDuration::from_secs(1_750_000_000);
        let set_mtime = |name: &str, mtime: SystemTime| {
            let path = episodic.join(name);
            std::fs::write(&path, "## Key Learning\n- x\n").unwrap();
            std::fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(mtime)
                .unwrap();
        };
        set_mtime("learning-edge.md", edge);
        set_mtime("learning-past.md", edge - StdDuration::from_secs(1));

        let now = DateTime::<Utc>::from(edge) + Duration::days(90);
        let learnings = load_learnings_at(&layout, 90, now).unwrap();
        let names: Vec<&str> = learnings.iter().map(|l| l.filename.as_str()).collect();
        assert_eq!(names, vec!["learning-edge.md"]);
    }

    #[test]
    fn test_load_learnings_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CnsLayout::new(dir.path());
        assert!(load_learnings(&layout, 90).unwrap().is_empty());
    }

    #[test]
    fn test_record_learning_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CnsLayout::new(dir.path());
        let now = Local.with_ymd_and_hms(2025, 6, 1, 9, 30, 15).unwrap();

        let path = record_learning(&layout, "Always run the full test suite before merging a branch. Then tag.", now).unwrap();
        assert_eq!(path.file_name().unwrap(), "learning-2025-06-01-093015.md");

        let summaries = recent_summaries(&layout, 5);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].timestamp, "2025-06-01 09:30:15");
        assert_eq!(
            summaries[0].summary,
            "Always run the full test suite before merging a branch."
        );
    }

    #[test]
    fn test_summarize_learning_fallback() {
        let content = "# Title\n**Meta**: x\n\nPlain first line of text\n";
        assert_eq!(summarize_learning(content), "Plain first line of text");
    }
}
