//! Personal CNS - memory toolkit for a personal AI assistant
//!
//! Reads and writes the plain markdown files that make up the assistant's
//! "central neural system":
//! - Prime principles (`cns/brain/prime-principles.md`)
//! - Episodic learnings (`cns/memory/episodic/learning-*.md`)
//! - Semantic best practices and session context files
//!
//! and evaluates them: which principles are supported or contradicted by
//! recent learnings, and which recurring insights deserve a new principle.
//!
//! # Example
//!
//! ```ignore
//! use personal_cns::{brain, memory::CnsLayout};
//!
//! let layout = CnsLayout::new("/home/me/.personal-cns");
//! let outcome = brain::evaluate_principles(&layout, &Default::default())?;
//! println!("{}", outcome.report);
//! ```

// Store and evaluation pipeline
pub mod memory;
pub mod brain;
pub mod config;
pub mod cli;

// Surfaces
pub mod maintenance;
pub mod startup;

pub use memory::{CnsLayout, Principle, LearningRecord};

pub use brain::{
    Insight,
    InsightCategory,
    Evaluation,
    EvaluationStatus,
    Candidate,
    EvaluationOutcome,
    evaluate_principles,
};

pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Personal CNS memory toolkit", NAME, VERSION)
}

/// Truncate a string to at most `max_len` characters, adding an ellipsis.
///
/// Works on char boundaries so multi-byte text never panics.
pub fn truncate_safe(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_safe() {
        assert_eq!(truncate_safe("hello", 10), "hello");
        assert_eq!(truncate_safe("hello world foo bar", 10), "hello w...");
        assert_eq!(truncate_safe("héllo wörld", 8), "héllo...");
    }
}
