//! CNS maintenance
//!
//! Runs the maintenance phases in order: principle evaluation, user pattern
//! learning, memory consolidation, reflex check and health analysis. Each
//! phase runs on a blocking worker under a wall-clock timeout; a failed phase
//! is recorded and the remaining phases still run. A timed-out worker is
//! cancelled and makes no further writes.

pub mod health;

use anyhow::Result;
use chrono::Utc;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::brain::patterns::{learn_user_patterns, AutoApprove, SuggestionReviewer, TerminalReviewer};
use crate::brain::evaluate_principles;
use crate::config::Config;
use crate::memory::{CancelFlag, CnsLayout};
use crate::truncate_safe;

/// Why a phase did not complete
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("{0}")]
    Failed(String),

    #[error("panicked: {0}")]
    Panicked(String),
}

/// What a successful phase reports back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseOutput {
    /// One-line result
    pub summary: String,
    /// Extra lines shown under the phase
    pub notes: Vec<String>,
    /// Human-readable descriptions of changes made
    pub modifications: Vec<String>,
}

impl PhaseOutput {
    fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// A tracked file that changed while a phase ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Contents of tracked files before a phase runs
struct Snapshot(Vec<(PathBuf, Option<String>)>);

impl Snapshot {
    fn capture(paths: &[PathBuf]) -> Self {
        Self(
            paths
                .iter()
                .map(|p| (p.clone(), std::fs::read_to_string(p).ok()))
                .collect(),
        )
    }

    fn changes(&self) -> Vec<FileChange> {
        self.0
            .iter()
            .filter_map(|(path, before)| {
                let after = std::fs::read_to_string(path).ok();
                let kind = match (before, &after) {
                    (None, Some(_)) => ChangeKind::Created,
                    (Some(_), None) => ChangeKind::Deleted,
                    (Some(b), Some(a)) if b != a => ChangeKind::Modified,
                    _ => return None,
                };
                Some(FileChange { path: path.clone(), kind })
            })
            .collect()
    }
}

/// Outcome of one phase
#[derive(Debug)]
pub struct PhaseResult {
    pub name: &'static str,
    pub outcome: Result<PhaseOutput, PhaseError>,
    pub file_changes: Vec<FileChange>,
    pub duration: Duration,
}

impl PhaseResult {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Work for one phase. Writers must check the flag before each write.
pub type PhaseTask = Box<dyn FnOnce(CancelFlag) -> Result<PhaseOutput> + Send + 'static>;

/// Run one phase on a blocking worker, bounded by `timeout`.
///
/// Tracked files are compared before and after the run. On timeout the
/// worker's flag is set, so it fails at its next write instead of landing
/// changes after the phase was reported.
pub async fn run_phase(
    name: &'static str,
    timeout: Duration,
    tracked: Vec<PathBuf>,
    task: PhaseTask,
) -> PhaseResult {
    info!("Starting maintenance phase: {}", name);
    let start = Instant::now();
    let snapshot = Snapshot::capture(&tracked);
    let cancel = CancelFlag::new();
    let worker_cancel = cancel.clone();

    let result = tokio::time::timeout(timeout, tokio::task::spawn_blocking(move || task(worker_cancel))).await;

    let outcome = match result {
        Ok(Ok(Ok(output))) => Ok(output),
        Ok(Ok(Err(e))) => Err(PhaseError::Failed(format!("{:#}", e))),
        Ok(Err(join_err)) if join_err.is_panic() => Err(PhaseError::Panicked(join_err.to_string())),
        Ok(Err(join_err)) => Err(PhaseError::Failed(join_err.to_string())),
        Err(_) => {
            cancel.cancel();
            Err(PhaseError::TimedOut(timeout))
        }
    };

    if let Err(e) = &outcome {
        warn!("Maintenance phase '{}' failed: {}", name, e);
    }

    PhaseResult {
        name,
        outcome,
        file_changes: snapshot.changes(),
        duration: start.elapsed(),
    }
}

/// Result of a full maintenance run
#[derive(Debug)]
pub struct MaintenanceSummary {
    pub phases: Vec<PhaseResult>,
    pub duration: Duration,
}

impl MaintenanceSummary {
    pub fn success_count(&self) -> usize {
        self.phases.iter().filter(|p| p.succeeded()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.phases.iter().all(PhaseResult::succeeded)
    }

    /// Reported modifications followed by detected file changes
    pub fn modifications(&self) -> Vec<String> {
        let mut mods: Vec<String> = self
            .phases
            .iter()
            .filter_map(|p| p.outcome.as_ref().ok())
            .flat_map(|o| o.modifications.iter().cloned())
            .collect();
        for phase in &self.phases {
            for change in &phase.file_changes {
                mods.push(format!("{} {}", change.path.display(), change.kind));
            }
        }
        mods
    }
}

impl fmt::Display for MaintenanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CNS UPDATE SUMMARY")?;
        writeln!(f, "{}", "=".repeat(60))?;

        for (i, phase) in self.phases.iter().enumerate() {
            match &phase.outcome {
                Ok(output) => {
                    writeln!(f, "{}. [ok] {}: {}", i + 1, phase.name, output.summary)?;
                    for note in &output.notes {
                        writeln!(f, "      {}", note)?;
                    }
                }
                Err(e) => writeln!(f, "{}. [FAILED] {}: {}", i + 1, phase.name, truncate_safe(&e.to_string(), 200))?,
            }
        }

        writeln!(f)?;
        writeln!(f, "Success Rate: {}/{} phases completed", self.success_count(), self.phases.len())?;
        writeln!(f, "Duration: {:.1} seconds", self.duration.as_secs_f64())?;

        let mods = self.modifications();
        if !mods.is_empty() {
            writeln!(f, "Files Modified: {}", mods.len())?;
            for (i, m) in mods.iter().enumerate() {
                writeln!(f, "   {}. {}", i + 1, m)?;
            }
        }
        Ok(())
    }
}

/// Maintenance runner over one CNS root
pub struct Maintenance {
    layout: CnsLayout,
    config: Config,
    interactive: bool,
}

impl Maintenance {
    pub fn new(layout: CnsLayout, config: Config) -> Self {
        Self {
            layout,
            config,
            interactive: true,
        }
    }

    /// Prompt for pattern suggestions (default) or approve them all
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    fn phases(&self) -> Vec<(&'static str, Vec<PathBuf>, PhaseTask)> {
        let mut phases: Vec<(&'static str, Vec<PathBuf>, PhaseTask)> = Vec::new();

        let layout = self.layout.clone();
        let config = self.config.evaluation.clone();
        phases.push((
            "Principle Evaluation",
            vec![self.layout.principles_path()],
            Box::new(move |cancel: CancelFlag| -> Result<PhaseOutput> {
                cancel.check("principle evaluation")?;
                let outcome = evaluate_principles(&layout, &config)?;
                let s = outcome.summary;
                let mut output = PhaseOutput::new(format!(
                    "{} active, {} under review, {} unused, {} new candidates",
                    s.active, s.under_review, s.unused, s.candidates
                ));
                if s.under_review > 0 {
                    output.notes.push(format!("{} principles need review", s.under_review));
                }
                if s.candidates > 0 {
                    output.notes.push(format!("{} new principle candidates identified", s.candidates));
                }
                Ok(output)
            }),
        ));

        let layout = self.layout.clone();
        let config = self.config.patterns.clone();
        let interactive = self.interactive;
        phases.push((
            "User Pattern Learning",
            vec![self.layout.user_patterns_path()],
            Box::new(move |cancel: CancelFlag| -> Result<PhaseOutput> {
                let mut reviewer: Box<dyn SuggestionReviewer> = if interactive {
                    Box::new(TerminalReviewer)
                } else {
                    Box::new(AutoApprove)
                };
                let outcome = learn_user_patterns(&layout, &config, reviewer.as_mut(), false, &cancel)?;
                Ok(PhaseOutput::new(outcome.to_string()))
            }),
        ));

        let layout = self.layout.clone();
        let config = self.config.maintenance.clone();
        phases.push((
            "Memory Consolidation",
            Vec::new(),
            Box::new(move |cancel: CancelFlag| -> Result<PhaseOutput> {
                let report = health::consolidate_memory(
                    &layout,
                    config.recent_learning_days,
                    config.context_keep_per_workspace,
                    Utc::now(),
                    &cancel,
                )?;
                let mut output = PhaseOutput::new(format!(
                    "{} episodic entries, {} from last {} days, {} context files",
                    report.episodic_files, report.recent_learnings, config.recent_learning_days, report.context_files
                ));
                let deleted = &report.deleted_context_files;
                if !deleted.is_empty() {
                    let shown: Vec<&str> = deleted.iter().take(3).map(String::as_str).collect();
                    output.modifications.push(format!(
                        "Deleted {} old context files: {}{}",
                        deleted.len(),
                        shown.join(", "),
                        if deleted.len() > 3 { "..." } else { "" }
                    ));
                }
                Ok(output)
            }),
        ));

        let layout = self.layout.clone();
        phases.push((
            "Reflex Check",
            Vec::new(),
            Box::new(move |cancel: CancelFlag| -> Result<PhaseOutput> {
                cancel.check("reflex check")?;
                let reflexes = health::check_reflexes(&layout)?;
                let mut output = PhaseOutput::new(format!("{} reflex definition files", reflexes.len()));
                output.notes = reflexes
                    .iter()
                    .map(|r| {
                        let state = if r.has_timestamp { "contains update timestamp" } else { "missing update timestamp" };
                        format!("{}: {}", r.name, state)
                    })
                    .collect();
                Ok(output)
            }),
        ));

        let layout = self.layout.clone();
        phases.push((
            "Health Analysis",
            Vec::new(),
            Box::new(move |cancel: CancelFlag| -> Result<PhaseOutput> {
                cancel.check("health analysis")?;
                let report = health::analyze_health(&layout);
                let mut output = PhaseOutput::new(format!(
                    "{}/{} components active, {}/{} memory systems active",
                    report.active_components(),
                    report.components.len(),
                    report.active_memory_systems(),
                    report.memory_systems.len()
                ));
                output.notes = report
                    .components
                    .iter()
                    .map(ToString::to_string)
                    .chain(report.memory_systems.iter().map(ToString::to_string))
                    .collect();
                Ok(output)
            }),
        ));

        phases
    }

    /// Run every phase in order
    pub async fn run(&self) -> MaintenanceSummary {
        let start = Instant::now();
        let timeout = Duration::from_secs(self.config.maintenance.phase_timeout_secs);

        let mut results = Vec::new();
        for (name, tracked, task) in self.phases() {
            results.push(run_phase(name, timeout, tracked, task).await);
        }

        let summary = MaintenanceSummary {
            phases: results,
            duration: start.elapsed(),
        };
        info!(
            "Maintenance finished: {}/{} phases succeeded",
            summary.success_count(),
            summary.phases.len()
        );
        summary
    }
}
