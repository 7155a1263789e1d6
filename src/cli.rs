//! CLI interface for the personal CNS

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::brain::patterns::{learn_user_patterns, AutoApprove, SuggestionReviewer, TerminalReviewer};
use crate::config::Config;
use crate::maintenance::Maintenance;
use crate::memory::{append_best_practice, record_learning, CancelFlag, CnsLayout};
use crate::startup::StartupStatus;

#[derive(Parser)]
#[command(name = "cns")]
#[command(about = "Personal CNS: principle evaluation, learning capture and maintenance", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory containing `cns/` (default: ~/.personal-cns)
    #[arg(long, global = true, env = "CNS_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate prime principles against recent learnings
    Evaluate {
        /// Analysis window in days
        #[arg(short, long)]
        days: Option<u32>,
        /// Print machine-readable JSON instead of the markdown report
        #[arg(long)]
        json: bool,
    },
    /// Capture a learning ("Learn this: ...")
    Learn {
        /// Learning text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Show the session startup banner
    Startup,
    /// Detect user behavior patterns and propose user-patterns.md updates
    Patterns {
        /// Run even on an established workspace
        #[arg(short, long)]
        force: bool,
        /// Approve every suggestion without prompting
        #[arg(short, long)]
        yes: bool,
    },
    /// Run every maintenance phase
    Maintain {
        /// Approve pattern suggestions without prompting
        #[arg(short, long)]
        yes: bool,
    },
    /// Show configuration
    Config {
        /// Print the effective configuration as TOML
        #[arg(long)]
        show: bool,
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

/// Text after an optional `Learn this:` prefix
fn learning_text(words: &[String]) -> Option<String> {
    let joined = words.join(" ");
    let trimmed = joined.trim();
    let text = trimmed
        .get(..11)
        .filter(|prefix| prefix.eq_ignore_ascii_case("learn this:"))
        .map(|_| trimmed[11..].trim())
        .unwrap_or(trimmed);
    (!text.is_empty()).then(|| text.to_string())
}

fn reviewer(yes: bool) -> Box<dyn SuggestionReviewer> {
    if yes {
        Box::new(AutoApprove)
    } else {
        Box::new(TerminalReviewer)
    }
}

/// Run the CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;
    let layout = config.layout(cli.root.clone())?;

    match cli.command {
        Commands::Evaluate { days, json } => {
            if let Some(days) = days {
                config.evaluation.days_back = days;
            }
            evaluate(&layout, &config, json)?;
        }
        Commands::Learn { text } => {
            let text = learning_text(&text).context("Nothing to learn: provide the learning text")?;
            learn(&layout, &text)?;
        }
        Commands::Startup => {
            print!("{}", StartupStatus::gather(&layout));
        }
        Commands::Patterns { force, yes } => {
            let outcome = learn_user_patterns(
                &layout,
                &config.patterns,
                reviewer(yes).as_mut(),
                force,
                &CancelFlag::new(),
            )?;
            println!("{}", outcome);
        }
        Commands::Maintain { yes } => {
            println!("Running CNS maintenance on {}", layout.root().display());
            let summary = Maintenance::new(layout, config).interactive(!yes).run().await;
            println!();
            print!("{}", summary);
            if !summary.all_succeeded() {
                std::process::exit(1);
            }
        }
        Commands::Config { show, init } => {
            println!("{}", crate::info());
            println!("Config file: {}", crate::config::config_path()?.display());
            if init {
                config.save()?;
                println!("Configuration written");
            }
            println!("CNS root: {}", layout.root().display());
            if show {
                println!();
                print!("{}", config.to_toml()?);
            }
        }
    }

    Ok(())
}

fn evaluate(layout: &CnsLayout, config: &Config, json: bool) -> Result<()> {
    let outcome = crate::brain::evaluate_principles(layout, &config.evaluation)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("{}", outcome.report);

    let s = outcome.summary;
    println!("EVALUATION SUMMARY:");
    println!("   Active: {}", s.active);
    println!("   Under Review: {}", s.under_review);
    println!("   Unused: {}", s.unused);
    println!("   New Candidates: {}", s.candidates);

    if s.needs_attention() {
        println!();
        println!("USER ATTENTION REQUIRED:");
        if s.under_review > 0 {
            println!("   - {} principles need review", s.under_review);
        }
        if s.candidates > 0 {
            println!("   - {} new principle candidates identified", s.candidates);
        }
    }
    Ok(())
}

fn learn(layout: &CnsLayout, text: &str) -> Result<()> {
    let now = Local::now();
    println!("CNS LEARNING PROTOCOL");
    println!("Timestamp: {}", now.format("%Y-%m-%d %H:%M:%S"));
    println!("Learning Content: {}", text);
    println!();

    let path = record_learning(layout, text, now)?;
    println!("Step 1: Episodic memory updated: {}", path.display());

    let created = append_best_practice(layout, text, now)?;
    if created {
        println!("Step 2: best-practices.md created");
    } else {
        println!("Step 2: Semantic memory (best-practices.md) updated");
    }

    println!();
    println!("Learning integrated into the CNS");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split(' ').map(String::from).collect()
    }

    #[test]
    fn test_learning_text_strips_prefix() {
        assert_eq!(learning_text(&words("Learn this: always rebase")).as_deref(), Some("always rebase"));
        assert_eq!(learning_text(&words("LEARN THIS:   pin versions")).as_deref(), Some("pin versions"));
        assert_eq!(learning_text(&words("pin versions")).as_deref(), Some("pin versions"));
        assert_eq!(learning_text(&words("Learn this:")), None);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["cns", "--root", "/tmp/x", "evaluate", "--days", "30", "--json"]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(cli.command, Commands::Evaluate { days: Some(30), json: true }));

        let cli = Cli::try_parse_from(["cns", "learn", "Learn", "this:", "x"]).unwrap();
        assert!(matches!(cli.command, Commands::Learn { ref text } if text.len() == 3));

        assert!(Cli::try_parse_from(["cns", "learn"]).is_err());
    }
}
