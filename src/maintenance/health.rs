//! Housekeeping checks run by the maintenance orchestrator

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, Utc};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::memory::{cleanup_context_files, CancelFlag, CnsLayout};

/// Documents whose presence signals a healthy CNS, relative to `cns/`
const KEY_DOCUMENTS: &[(&str, &str)] = &[
    ("brain/prime-principles.md", "Prime principles"),
    ("brain/user-patterns.md", "User behavior patterns"),
    ("memory/semantic/best-practices.md", "Best practices"),
];

const MEMORY_SYSTEMS: &[&str] = &["memory/episodic", "memory/context", "memory/semantic", "memory/procedural"];

fn markdown_files(dir: &Path) -> Result<Vec<(String, SystemTime)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(".md") {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((name, modified));
    }
    files.sort();
    Ok(files)
}

/// Result of the memory consolidation phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub episodic_files: usize,
    pub recent_learnings: usize,
    pub context_files: usize,
    pub deleted_context_files: Vec<String>,
}

/// Count episodic files and prune old context files
pub fn consolidate_memory(
    layout: &CnsLayout,
    recent_days: u32,
    keep_per_workspace: usize,
    now: DateTime<Utc>,
    cancel: &CancelFlag,
) -> Result<ConsolidationReport> {
    let mut report = ConsolidationReport::default();

    let episodic = layout.episodic_dir();
    if episodic.exists() {
        let cutoff = now - Duration::days(i64::from(recent_days));
        let files = markdown_files(&episodic)?;
        report.episodic_files = files.len();
        report.recent_learnings = files
            .iter()
            .filter(|(_, modified)| DateTime::<Utc>::from(*modified) >= cutoff)
            .count();
    }

    let context = layout.context_dir();
    if context.exists() {
        report.context_files = markdown_files(&context)?
            .iter()
            .filter(|(name, _)| name.starts_with("context-"))
            .count();
        report.deleted_context_files = cleanup_context_files(layout, keep_per_workspace, cancel)?;
    }

    debug!("Memory consolidation: {:?}", report);
    Ok(report)
}

/// A reflex definition and whether it carries an update marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflexStatus {
    pub name: String,
    pub has_timestamp: bool,
}

/// List reflex definitions, flagging those without `Last Updated`
pub fn check_reflexes(layout: &CnsLayout) -> Result<Vec<ReflexStatus>> {
    let dir = layout.reflexes_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut reflexes = Vec::new();
    for (name, _) in markdown_files(&dir)? {
        let content = match std::fs::read_to_string(dir.join(&name)) {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not read reflex {}: {}", name, e);
                continue;
            }
        };
        reflexes.push(ReflexStatus {
            has_timestamp: content.contains("Last Updated"),
            name,
        });
    }
    Ok(reflexes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentHealth {
    pub path: String,
    pub description: String,
    pub last_modified: Option<DateTime<Local>>,
    pub size: Option<u64>,
}

impl ComponentHealth {
    pub fn is_active(&self) -> bool {
        self.size.is_some()
    }
}

impl std::fmt::Display for ComponentHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.size, self.last_modified) {
            (Some(size), Some(modified)) => write!(
                f,
                "{}: {} bytes, last modified {}",
                self.path,
                size,
                modified.format("%Y-%m-%d %H:%M:%S")
            ),
            (Some(size), None) => write!(f, "{}: {} bytes", self.path, size),
            (None, _) => write!(f, "{}: missing ({})", self.path, self.description),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySystemHealth {
    pub path: String,
    pub present: bool,
    pub file_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub components: Vec<ComponentHealth>,
    pub memory_systems: Vec<MemorySystemHealth>,
}

impl std::fmt::Display for MemorySystemHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.present {
            write!(f, "{}: {} files", self.path, self.file_count)
        } else {
            write!(f, "{}: missing", self.path)
        }
    }
}

impl HealthReport {
    pub fn active_components(&self) -> usize {
        self.components.iter().filter(|c| c.is_active()).count()
    }

    pub fn active_memory_systems(&self) -> usize {
        self.memory_systems.iter().filter(|m| m.present).count()
    }
}

/// Presence of key documents and memory directories
pub fn analyze_health(layout: &CnsLayout) -> HealthReport {
    let components = KEY_DOCUMENTS
        .iter()
        .map(|(path, description)| {
            let meta = std::fs::metadata(layout.cns_path(path)).ok();
            ComponentHealth {
                path: path.to_string(),
                description: description.to_string(),
                last_modified: meta
                    .as_ref()
                    .and_then(|m| m.modified().ok())
                    .map(DateTime::<Local>::from),
                size: meta.map(|m| m.len()),
            }
        })
        .collect();

    let memory_systems = MEMORY_SYSTEMS
        .iter()
        .map(|path| {
            let dir = layout.cns_path(path);
            let file_count = markdown_files(&dir).map(|f| f.len()).unwrap_or(0);
            MemorySystemHealth {
                path: path.to_string(),
                present: dir.is_dir(),
                file_count,
            }
        })
        .collect();

    HealthReport { components, memory_systems }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consolidate_counts_recent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CnsLayout::new(dir.path());
        std::fs::create_dir_all(layout.episodic_dir()).unwrap();

        let fresh = layout.episodic_dir().join("learning-fresh.md");
        let stale = layout.episodic_dir().join("learning-stale.md");
        std::fs::write(&fresh, "x").unwrap();
        std::fs::write(&stale, "x").unwrap();
        std::fs::write(layout.episodic_dir().join("notes.txt"), "x").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(SystemTime::now() - std::time::Duration::from_secs(60 * 86_400))
            .unwrap();

        let report = consolidate_memory(&layout, 30, 5, Utc::now(), &CancelFlag::new()).unwrap();
        assert_eq!(report.episodic_files, 2);
        assert_eq!(report.recent_learnings, 1);
        assert_eq!(report.context_files, 0);
        assert!(report.deleted_context_files.is_empty());
    }

    #[test]
    fn test_check_reflexes() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CnsLayout::new(dir.path());
        std::fs::create_dir_all(layout.reflexes_dir()).unwrap();
        std::fs::write(layout.reflexes_dir().join("a.md"), "**Last Updated**: 2025-01-01").unwrap();
        std::fs::write(layout.reflexes_dir().join("b.md"), "no marker").unwrap();

        let reflexes = check_reflexes(&layout).unwrap();
        assert_eq!(
            reflexes,
            vec![
                ReflexStatus { name: "a.md".to_string(), has_timestamp: true },
                ReflexStatus { name: "b.md".to_string(), has_timestamp: false },
            ]
        );
    }

    #[test]
    fn test_analyze_health() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CnsLayout::new(dir.path());
        std::fs::create_dir_all(layout.brain_dir()).unwrap();
        std::fs::create_dir_all(layout.episodic_dir()).unwrap();
        std::fs::write(layout.principles_path(), "# Principles\n").unwrap();
        std::fs::write(layout.episodic_dir().join("learning-1.md"), "x").unwrap();

        let health = analyze_health(&layout);
        assert_eq!(health.active_components(), 1);
        assert_eq!(health.components.len(), 3);
        assert_eq!(health.active_memory_systems(), 1);
        assert_eq!(health.memory_systems[0].file_count, 1);

        let principles = health.components[0].to_string();
        assert!(principles.starts_with("brain/prime-principles.md: 13 bytes, last modified "));
        assert_eq!(
            health.components[1].to_string(),
            "brain/user-patterns.md: missing (User behavior patterns)"
        );
        assert_eq!(health.memory_systems[0].to_string(), "memory/episodic: 1 files");
        assert_eq!(health.memory_systems[1].to_string(), "memory/context: missing");
    }
}
