//! Session context files and their retention
//!
//! Context files are named `context-YYYY-MM-DD-<workspace>.md`. Only the most
//! recent few per workspace are kept.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{info, warn};

use super::{CancelFlag, CnsLayout};

/// Workspace key of a context filename, if it follows the naming scheme.
///
/// Everything after the date parts, e.g. `context-2025-01-02-my-repo.md`
/// gives `my-repo`.
pub fn workspace_of(filename: &str) -> Option<String> {
    if !filename.starts_with("context-") || filename.matches('-').count() < 4 {
        return None;
    }
    let stem = filename.strip_suffix(".md").unwrap_or(filename);
    let parts: Vec<&str> = stem.split('-').collect();
    Some(parts[4.min(parts.len())..].join("-"))
}

/// Delete all but the newest `keep` context files per workspace.
///
/// Returns the names of the deleted files. Files that cannot be deleted are
/// logged and kept. Stops with an error once `cancel` is set.
pub fn cleanup_context_files(layout: &CnsLayout, keep: usize, cancel: &CancelFlag) -> Result<Vec<String>> {
    let dir = layout.context_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut by_workspace: BTreeMap<String, Vec<(PathBuf, SystemTime)>> = BTreeMap::new();
    for entry in std::fs::read_dir(&dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
    {
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
        let Some(workspace) = workspace_of(&name) else {
            continue;
        };
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        by_workspace.entry(workspace).or_default().push((entry.path(), modified));
    }

    let mut deleted = Vec::new();
    for (workspace, mut files) in by_workspace {
        if files.len() <= keep {
            continue;
        }
        files.sort_by(|a, b| b.1.cmp(&a.1));
        for (path, _) in files.into_iter().skip(keep) {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            cancel.check(&format!("deleting {}", name))?;
            match std::fs::remove_file(&path) {
                Ok(()) => deleted.push(name),
                Err(e) => warn!("Could not delete {} ({}): {}", name, workspace, e),
            }
        }
    }

    if !deleted.is_empty() {
        info!("Cleaned up {} old context files", deleted.len());
    }
    Ok(deleted)
}
