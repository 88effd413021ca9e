//! Markdown report generation.
//!
//! Renders a consolidated review as a standalone Markdown document for the
//! one-shot `--analyze` mode. The HTTP surface returns the JSON form.

use crate::analysis::Orchestration;
use crate::models::{AgentFailure, AgentName, AttributedSuggestion, CodeSnippet, ConsolidatedReport};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Context printed alongside the report.
#[derive(Debug, Clone)]
pub struct ReportMetadata {
    pub analysis_date: DateTime<Utc>,
    pub snippet_lines: usize,
    /// Agents the snippet was dispatched to, in registry order.
    pub agents: Vec<AgentName>,
    pub duration_seconds: f64,
    pub record_id: Option<i64>,
}

impl ReportMetadata {
    pub fn new(snippet: &CodeSnippet, agents: Vec<AgentName>, orchestration: &Orchestration) -> Self {
        Self {
            analysis_date: Utc::now(),
            snippet_lines: snippet.as_str().lines().count(),
            agents,
            duration_seconds: orchestration.duration_seconds,
            record_id: orchestration.record_id,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &ConsolidatedReport, metadata: &ReportMetadata) -> String {
    let mut output = String::new();

    output.push_str("# AuditCrew Report\n\n");
    output.push_str(&generate_metadata_section(report, metadata));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_agents_section(report, &metadata.agents));
    output.push_str(&generate_suggestions_section(&report.suggestions));
    output.push_str(&generate_failures_section(&report.failures));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(report: &ConsolidatedReport, metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Snippet Lines:** {}\n", metadata.snippet_lines));
    section.push_str(&format!("- **Agents Consulted:** {}\n", metadata.agents.len()));
    if !report.failures.is_empty() {
        section.push_str(&format!("- **Agents Failed:** {}\n", report.failures.len()));
    }
    section.push_str(&format!(
        "- **Total Suggestions:** {}\n",
        report.suggestions.len()
    ));
    if let Some(id) = metadata.record_id {
        section.push_str(&format!("- **Record Id:** {}\n", id));
    }
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_table_of_contents(report: &ConsolidatedReport) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Agents](#agents)\n");
    toc.push_str("- [Suggestions](#suggestions)\n");

    for (i, item) in report.suggestions.iter().enumerate() {
        toc.push_str(&format!(
            "  - [{}](#{})\n",
            item.suggestion.title,
            suggestion_anchor(i)
        ));
    }

    if !report.failures.is_empty() {
        toc.push_str("- [Failed Agents](#failed-agents)\n");
    }

    toc.push('\n');

    toc
}

fn suggestion_anchor(index: usize) -> String {
    format!("suggestion-{}", index + 1)
}

/// Per-agent status table.
fn generate_agents_section(report: &ConsolidatedReport, agents: &[AgentName]) -> String {
    let mut section = String::new();

    section.push_str("## Agents\n\n");

    if agents.is_empty() {
        section.push_str("No agents are configured. Set an agent URL to enable it.\n\n");
        return section;
    }

    section.push_str("| Agent | Status | Suggestions |\n");
    section.push_str("|:---|:---|:---:|\n");

    for agent in agents {
        let status = match report.failure_for(agent) {
            Some(failure) => format!("❌ {}", failure.kind),
            None => "✅ OK".to_string(),
        };
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            agent,
            status,
            report.contributions(agent)
        ));
    }
    section.push('\n');

    section
}

fn generate_suggestions_section(suggestions: &[AttributedSuggestion]) -> String {
    let mut section = String::new();

    section.push_str("## Suggestions\n\n");

    if suggestions.is_empty() {
        section.push_str("No suggestions were reported for this snippet.\n\n");
        return section;
    }

    for (i, item) in suggestions.iter().enumerate() {
        section.push_str(&generate_suggestion_block(i, item));
    }

    section
}

fn generate_suggestion_block(index: usize, item: &AttributedSuggestion) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### {}. {} {{#{}}}\n\n",
        index + 1,
        item.suggestion.title,
        suggestion_anchor(index)
    ));

    let agents: Vec<&str> = item.agents.iter().map(AgentName::as_str).collect();
    block.push_str(&format!("*Reported by: {}*\n\n", agents.join(", ")));

    block.push_str(&format!(
        "**Explanation:** {}\n\n",
        item.suggestion.explanation
    ));

    let example = &item.suggestion.code_example;
    if !example.trim().is_empty() {
        let fence = code_fence(example);
        block.push_str("<details>\n<summary>View Example</summary>\n\n");
        block.push_str(&format!("{}\n{}\n{}\n", fence, example, fence));
        block.push_str("</details>\n\n");
    }

    block.push_str("---\n\n");

    block
}

/// A backtick fence longer than any backtick run inside `code`.
fn code_fence(code: &str) -> String {
    let longest = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

fn generate_failures_section(failures: &[AgentFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Failed Agents\n\n");
    section.push_str("These agents did not contribute; the report above is partial.\n\n");

    for failure in failures {
        section.push_str(&format!(
            "- **{}** ({}): {}\n",
            failure.agent, failure.kind, failure.detail
        ));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by AuditCrew v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report, the same document the HTTP endpoint returns.
pub fn generate_json_report(report: &ConsolidatedReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
