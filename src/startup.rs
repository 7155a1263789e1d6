//! Session startup banner
//!
//! Shows which CNS documents are present and the most recent learnings.

use std::fmt;

use crate::memory::episodic::count_learnings;
use crate::memory::{recent_summaries, CnsLayout, LearningSummary};

const BRAIN_COMPONENTS: &[(&str, &str)] = &[
    ("brain/identity.md", "Identity & Purpose"),
    ("brain/capabilities.md", "Enhanced Capabilities"),
    ("brain/prime-principles.md", "Operating Principles"),
    ("brain/decision-framework.md", "Decision Framework"),
    ("brain/user-patterns.md", "User Patterns"),
];

const MEMORY_DOCUMENTS: &[(&str, &str)] = &[
    ("memory/semantic/best-practices.md", "Semantic Memory (Best Practices)"),
    ("memory/procedural/workflow-patterns.md", "Procedural Memory (Workflow Patterns)"),
    ("memory/user-preferences.md", "User Preferences"),
];

const REFLEX_COMPONENTS: &[(&str, &str)] = &[
    ("reflexes/trigger-responses.md", "Trigger Responses"),
    ("reflexes/error-handling.md", "Error Handling"),
    ("reflexes/quality-checks.md", "Quality Checks"),
];

const INTEGRATION_COMPONENTS: &[(&str, &str)] = &[
    ("integration/prompt-engineering.md", "Prompt Engineering Strategies"),
];

const RECENT_LEARNINGS_SHOWN: usize = 5;

/// A named document and whether it exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentStatus {
    pub name: &'static str,
    pub present: bool,
}

fn check(layout: &CnsLayout, components: &[(&'static str, &'static str)]) -> Vec<ComponentStatus> {
    components
        .iter()
        .map(|(path, name)| ComponentStatus {
            name,
            present: layout.cns_path(path).exists(),
        })
        .collect()
}

/// Everything the banner shows
#[derive(Debug, Clone)]
pub struct StartupStatus {
    pub brain: Vec<ComponentStatus>,
    pub episodic_count: usize,
    pub recent_learnings: Vec<LearningSummary>,
    pub memory: Vec<ComponentStatus>,
    pub reflexes: Vec<ComponentStatus>,
    pub integration: Vec<ComponentStatus>,
}

impl StartupStatus {
    pub fn gather(layout: &CnsLayout) -> Self {
        Self {
            brain: check(layout, BRAIN_COMPONENTS),
            episodic_count: count_learnings(layout),
            recent_learnings: recent_summaries(layout, RECENT_LEARNINGS_SHOWN),
            memory: check(layout, MEMORY_DOCUMENTS),
            reflexes: check(layout, REFLEX_COMPONENTS),
            integration: check(layout, INTEGRATION_COMPONENTS),
        }
    }
}

fn write_components(f: &mut fmt::Formatter<'_>, components: &[ComponentStatus]) -> fmt::Result {
    for c in components {
        writeln!(f, "   {} {}", if c.present { "[x]" } else { "[ ]" }, c.name)?;
    }
    Ok(())
}

impl fmt::Display for StartupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, "CENTRAL NEURAL SYSTEM INITIALIZATION")?;
        writeln!(f, "{}", rule)?;
        writeln!(f)?;

        writeln!(f, "BRAIN COMPONENTS:")?;
        write_components(f, &self.brain)?;
        writeln!(f)?;

        writeln!(f, "MEMORY SYSTEMS:")?;
        writeln!(f, "   [x] Episodic Memory ({} learnings)", self.episodic_count)?;
        if !self.recent_learnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "   Recent Learnings (last {}):", RECENT_LEARNINGS_SHOWN)?;
            for (i, learning) in self.recent_learnings.iter().enumerate() {
                writeln!(f, "      {}. [{}]", i + 1, learning.timestamp)?;
                writeln!(f, "         {}", learning.summary)?;
            }
        }
        writeln!(f)?;
        write_components(f, &self.memory)?;
        writeln!(f)?;

        writeln!(f, "REFLEX SYSTEM:")?;
        write_components(f, &self.reflexes)?;
        writeln!(f)?;

        writeln!(f, "INTEGRATION:")?;
        write_components(f, &self.integration)?;
        writeln!(f)?;

        writeln!(f, "{}", rule)?;
        writeln!(f, "CENTRAL NEURAL SYSTEM OPERATIONAL")?;
        writeln!(f, "{}", rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_and_render() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CnsLayout::new(dir.path());
        std::fs::create_dir_all(layout.brain_dir()).unwrap();
        std::fs::create_dir_all(layout.episodic_dir()).unwrap();
        std::fs::write(layout.principles_path(), "# Principles\n").unwrap();
        std::fs::write(
            layout.episodic_dir().join("learning-2025-03-01-101500.md"),
            "# Critical Learning Captured\n## Learning Content\nAlways rebase before merging.\n",
        )
        .unwrap();
        std::fs::write(layout.episodic_dir().join("learning-template.md"), "template").unwrap();

        let status = StartupStatus::gather(&layout);
        assert_eq!(status.episodic_count, 1);
        assert_eq!(status.recent_learnings.len(), 1);
        assert!(status.brain.iter().any(|c| c.name == "Operating Principles" && c.present));
        assert!(!status.reflexes.iter().any(|c| c.present));

        let text = status.to_string();
        assert!(text.contains("   [x] Operating Principles"));
        assert!(text.contains("   [ ] Identity & Purpose"));
        assert!(text.contains("Episodic Memory (1 learnings)"));
        assert!(text.contains("      1. [2025-03-01 10:15:00]"));
        assert!(text.contains("Always rebase before merging."));
    }
}
