//! Insight extraction from learning markdown
//!
//! Bullet points under a handful of retrospective headings become
//! [`Insight`]s, each classified into a coarse category by keyword.

use serde::{Deserialize, Serialize};

/// Headings whose bullet points carry insights (lowercased)
const INSIGHT_SECTIONS: &[&str] = &[
    "what went well",
    "what didn't work",
    "what to do differently",
    "key learning",
];

/// Keyword vocabularies in tie-break order; first match wins
const CATEGORY_KEYWORDS: &[(InsightCategory, &[&str])] = &[
    (InsightCategory::Interface, &["interface", "display", "output", "ui"]),
    (InsightCategory::Architecture, &["architecture", "design", "structure"]),
    (InsightCategory::Process, &["process", "workflow", "methodology"]),
    (InsightCategory::Startup, &["startup", "initialization", "loading"]),
    (InsightCategory::Context, &["context", "memory", "continuity"]),
];

/// Coarse topic of an insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightCategory {
    Interface,
    Architecture,
    Process,
    Startup,
    Context,
    General,
}

impl InsightCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightCategory::Interface => "interface",
            InsightCategory::Architecture => "architecture",
            InsightCategory::Process => "process",
            InsightCategory::Startup => "startup",
            InsightCategory::Context => "context",
            InsightCategory::General => "general",
        }
    }

    /// Capitalized name for report headings
    pub fn title(&self) -> &'static str {
        match self {
            InsightCategory::Interface => "Interface",
            InsightCategory::Architecture => "Architecture",
            InsightCategory::Process => "Process",
            InsightCategory::Startup => "Startup",
            InsightCategory::Context => "Context",
            InsightCategory::General => "General",
        }
    }
}

impl std::fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single bullet-point observation from a learning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    /// Lowercased heading the bullet was found under
    pub section: String,
    pub text: String,
    pub category: InsightCategory,
}

/// Extract insights from learning content, in document order
pub fn extract_insights(content: &str) -> Vec<Insight> {
    let mut insights = Vec::new();
    let mut current_section: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();

        if line.starts_with("# ") || line.starts_with("## ") {
            current_section = Some(line.trim_start_matches('#').trim().to_lowercase());
            continue;
        }

        let in_insight_section = current_section
            .as_deref()
            .is_some_and(|s| INSIGHT_SECTIONS.contains(&s));
        if !in_insight_section {
            continue;
        }

        if let Some(text) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            let text = text.trim();
            insights.push(Insight {
                section: current_section.clone().unwrap_or_default(),
                text: text.to_string(),
                category: classify(text),
            });
        }
    }

    insights
}

/// Classify insight text by the first keyword vocabulary it hits
pub fn classify(text: &str) -> InsightCategory {
    let lower = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(category, _)| *category)
        .unwrap_or(InsightCategory::General)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEARNING: &str = "# Learning: Deploy pipeline\n\
\n\
## Context\n\
- not an insight, wrong section\n\
\n\
## What Went Well\n\
- The new workflow cut review time\n\
* Clear Output formatting helped\n\
  - nested bullet about memory usage\n\
Plain text line\n\
\n\
## What Didn't Work\n\
- Loading took too long on startup\n\
-no space bullet is ignored\n\
\n\
### Sub heading stays in section\n\
- Something general\n\
\n\
## Key Learning\n\
- Design the structure first\n";

    #[test]
    fn test_extract_insights_sections() {
        let insights = extract_insights(LEARNING);
        let texts: Vec<&str> = insights.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "The new workflow cut review time",
                "Clear Output formatting helped",
                "nested bullet about memory usage",
                "Loading took too long on startup",
                "Something general",
                "Design the structure first",
            ]
        );
        assert_eq!(insights[0].section, "what went well");
        assert_eq!(insights[3].section, "what didn't work");
        assert_eq!(insights[5].section, "key learning");
    }

    #[test]
    fn test_extract_insights_categories() {
        let insights = extract_insights(LEARNING);
        let categories: Vec<InsightCategory> = insights.iter().map(|i| i.category).collect();
        assert_eq!(
            categories,
            vec![
                InsightCategory::Process,
                InsightCategory::Interface,
                InsightCategory::Context,
                InsightCategory::Startup,
                InsightCategory::General,
                InsightCategory::Architecture,
            ]
        );
    }

    #[test]
    fn test_extract_is_idempotent() {
        assert_eq!(extract_insights(LEARNING), extract_insights(LEARNING));
    }

    #[test]
    fn test_classify_order_is_tie_break() {
        // Both interface and process words: interface is checked first
        assert_eq!(classify("Display the workflow state"), InsightCategory::Interface);
        // "ui" matches as a substring, as in "build"
        assert_eq!(classify("Rebuild everything"), InsightCategory::Interface);
        assert_eq!(classify("Nothing relevant here"), InsightCategory::General);
        assert_eq!(classify("CONTEXT matters"), InsightCategory::Context);
    }
}
