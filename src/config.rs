//! Configuration management
//!
//! Thresholds for evaluation, pattern learning and maintenance, plus the CNS
//! root directory. Stored as TOML in the platform config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use crate::brain::PrincipleLimits;
use crate::memory::CnsLayout;

/// Evaluation window used when nothing else is configured
pub const DEFAULT_DAYS_BACK: u32 = 90;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory containing `cns/` (defaults to `~/.personal-cns`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub patterns: PatternsConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Learnings older than this many days are ignored
    #[serde(default = "default_days_back")]
    pub days_back: u32,
    /// Hard cap on the number of principles
    #[serde(default = "default_max_principles")]
    pub max_principles: usize,
    /// Above this count candidates need a high quality score
    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: usize,
    #[serde(default = "default_strict_quality_score")]
    pub strict_quality_score: u32,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

fn default_days_back() -> u32 {
    DEFAULT_DAYS_BACK
}

fn default_max_principles() -> usize {
    15
}

fn default_warn_threshold() -> usize {
    12
}

fn default_strict_quality_score() -> u32 {
    80
}

fn default_max_candidates() -> usize {
    3
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            days_back: default_days_back(),
            max_principles: default_max_principles(),
            warn_threshold: default_warn_threshold(),
            strict_quality_score: default_strict_quality_score(),
            max_candidates: default_max_candidates(),
        }
    }
}

impl EvaluationConfig {
    pub fn limits(&self) -> PrincipleLimits {
        PrincipleLimits {
            max_principles: self.max_principles,
            warn_threshold: self.warn_threshold,
            strict_quality_score: self.strict_quality_score,
            max_candidates: self.max_candidates,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternsConfig {
    /// How far back the pattern learner reads learnings
    #[serde(default = "default_pattern_days_back")]
    pub days_back: u32,
    /// A `cns/` directory younger than this counts as a new workspace
    #[serde(default = "default_new_workspace_days")]
    pub new_workspace_days: u32,
    /// Fewer episodic files than this also counts as a new workspace
    #[serde(default = "default_min_learning_files")]
    pub min_learning_files: usize,
}

fn default_pattern_days_back() -> u32 {
    14
}

fn default_new_workspace_days() -> u32 {
    7
}

fn default_min_learning_files() -> usize {
    3
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            days_back: default_pattern_days_back(),
            new_workspace_days: default_new_workspace_days(),
            min_learning_files: default_min_learning_files(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Per-phase timeout in seconds
    #[serde(default = "default_phase_timeout")]
    pub phase_timeout_secs: u64,
    /// Context files kept per workspace
    #[serde(default = "default_context_keep")]
    pub context_keep_per_workspace: usize,
    /// Window for the "recent learnings" count
    #[serde(default = "default_recent_learning_days")]
    pub recent_learning_days: u32,
}

fn default_phase_timeout() -> u64 {
    300
}

fn default_context_keep() -> usize {
    5
}

fn default_recent_learning_days() -> u32 {
    30
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            phase_timeout_secs: default_phase_timeout(),
            context_keep_per_workspace: default_context_keep(),
            recent_learning_days: default_recent_learning_days(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults.
    ///
    /// A missing file is not created; use [`Config::save`] for that.
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            Self::from_toml(&contents)
        } else {
            debug!("No config file at {}, using defaults", config_path.display());
            Ok(Config::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config file")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        std::fs::write(&config_path, self.to_toml()?)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Resolve the CNS root: explicit override, then the configured root,
    /// then `~/.personal-cns`.
    pub fn resolve_root(&self, override_root: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(root) = override_root.or_else(|| self.root.clone()) {
            return Ok(root);
        }
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".personal-cns"))
    }

    pub fn layout(&self, override_root: Option<PathBuf>) -> Result<CnsLayout> {
        Ok(CnsLayout::new(self.resolve_root(override_root)?))
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "personal-cns", "cns")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}
