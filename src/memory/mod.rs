//! Markdown Record Store
//!
//! All CNS state lives in plain markdown files under a single root:
//!
//! ```text
//! <root>/cns/brain/prime-principles.md
//! <root>/cns/brain/user-patterns.md
//! <root>/cns/memory/episodic/learning-*.md
//! <root>/cns/memory/semantic/best-practices.md
//! <root>/cns/memory/context/context-*.md
//! ```
//!
//! Reads are tolerant (missing documents become empty collections). Writes
//! always replace the whole file through [`write_atomic`].

pub mod principles;
pub mod episodic;
pub mod semantic;
pub mod context;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

pub use principles::{Principle, ValidationStatus, Confidence, load_principles, parse_principles};
pub use episodic::{LearningRecord, LearningSummary, load_learnings, record_learning, recent_summaries};
pub use semantic::append_best_practice;
pub use context::cleanup_context_files;

/// Filesystem layout of a CNS root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnsLayout {
    root: PathBuf,
}

impl CnsLayout {
    /// Create a layout rooted at `root` (the directory that contains `cns/`)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cns_dir(&self) -> PathBuf {
        self.root.join("cns")
    }

    pub fn brain_dir(&self) -> PathBuf {
        self.cns_dir().join("brain")
    }

    pub fn principles_path(&self) -> PathBuf {
        self.brain_dir().join("prime-principles.md")
    }

    pub fn user_patterns_path(&self) -> PathBuf {
        self.brain_dir().join("user-patterns.md")
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.cns_dir().join("memory")
    }

    pub fn episodic_dir(&self) -> PathBuf {
        self.memory_dir().join("episodic")
    }

    pub fn semantic_dir(&self) -> PathBuf {
        self.memory_dir().join("semantic")
    }

    pub fn best_practices_path(&self) -> PathBuf {
        self.semantic_dir().join("best-practices.md")
    }

    pub fn context_dir(&self) -> PathBuf {
        self.memory_dir().join("context")
    }

    pub fn reflexes_dir(&self) -> PathBuf {
        self.cns_dir().join("reflexes")
    }

    /// Resolve a path relative to `cns/` (e.g. `brain/identity.md`)
    pub fn cns_path(&self, relative: &str) -> PathBuf {
        self.cns_dir().join(relative)
    }
}

/// Shared stop signal for a worker that writes to the store.
///
/// Writers check it right before touching a file, so a supervisor that gave
/// up on the worker never sees a late write.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with `what` in the message once cancelled
    pub fn check(&self, what: &str) -> Result<()> {
        if self.is_cancelled() {
            anyhow::bail!("Cancelled before {}", what);
        }
        Ok(())
    }
}

/// Read a document that may legitimately not exist yet
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Some(content))
}

/// Replace a file's content so readers never observe a partial write.
///
/// The content goes to a sibling `.tmp` file first and is then renamed over
/// the target.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("md.tmp");
    std::fs::write(&tmp_path, content)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

static LAST_UPDATED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*Last Updated\*\*:.*").expect("valid last-updated regex")
});

/// Rewrite every `**Last Updated**:` field to `now`
pub fn touch_last_updated(content: &str, now: DateTime<Utc>) -> String {
    let stamp = format!("**Last Updated**: {}", now.format("%Y-%m-%dT%H:%M:%SZ"));
    LAST_UPDATED_RE
        .replace_all(content, regex::NoExpand(&stamp))
        .into_owned()
}

/// File modification time as a UTC timestamp
pub(crate) fn modified_at(path: &Path) -> Result<DateTime<Utc>> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    Ok(DateTime::<Utc>::from(modified))
}
