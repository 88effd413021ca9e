//! Data models for the orchestrator.
//!
//! This module contains the core data structures shared by the agent
//! clients, the consolidation pipeline, the HTTP surface and the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Immutable code snippet submitted for analysis.
///
/// The orchestrator never parses or executes it; it is only forwarded to
/// agents and persisted. Cloning is cheap so every dispatched task can own one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSnippet(Arc<str>);

impl CodeSnippet {
    pub fn new(code: impl Into<Arc<str>>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CodeSnippet {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl From<&str> for CodeSnippet {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Logical name of a specialist agent (`security`, `performance`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentName(String);

impl AgentName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for AgentName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// One actionable finding reported by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Short descriptive title.
    pub title: String,
    /// Why the code is a problem.
    pub explanation: String,
    /// Corrected version of the code.
    pub code_example: String,
}

impl Suggestion {
    pub fn new(
        title: impl Into<String>,
        explanation: impl Into<String>,
        code_example: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            explanation: explanation.into(),
            code_example: code_example.into(),
        }
    }

    /// Content key used for deduplication: trimmed, case-folded title and explanation.
    pub fn dedup_key(&self) -> (String, String) {
        (normalize(&self.title), normalize(&self.explanation))
    }

    /// Returns the name of the first required field that is blank, if any.
    pub fn blank_field(&self) -> Option<&'static str> {
        if self.title.trim().is_empty() {
            Some("title")
        } else if self.explanation.trim().is_empty() {
            Some("explanation")
        } else {
            None
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Why an agent call did not produce suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, DNS failure, connection reset.
    Unreachable,
    /// The call exceeded its own deadline (or was cancelled).
    Timeout,
    /// The agent answered with a non-success status.
    RemoteError,
    /// The agent answered with a body that is not a suggestion list.
    MalformedResponse,
    /// The call's task aborted before producing an outcome.
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Unreachable => write!(f, "Unreachable"),
            FailureKind::Timeout => write!(f, "Timeout"),
            FailureKind::RemoteError => write!(f, "Remote error"),
            FailureKind::MalformedResponse => write!(f, "Malformed response"),
            FailureKind::Internal => write!(f, "Internal"),
        }
    }
}

/// Terminal result of one agent call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutcome {
    Success { suggestions: Vec<Suggestion> },
    Failure { kind: FailureKind, detail: String },
}

impl AgentOutcome {
    pub fn success(suggestions: Vec<Suggestion>) -> Self {
        AgentOutcome::Success { suggestions }
    }

    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        AgentOutcome::Failure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AgentOutcome::Success { .. })
    }

    #[cfg(test)]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            AgentOutcome::Failure { kind, .. } => Some(*kind),
            AgentOutcome::Success { .. } => None,
        }
    }
}

/// A failed agent as recorded in the consolidated report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFailure {
    pub agent: AgentName,
    pub kind: FailureKind,
    pub detail: String,
}

/// A deduplicated suggestion with every agent that reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributedSuggestion {
    #[serde(flatten)]
    pub suggestion: Suggestion,
    /// Contributing agents, in first-seen order.
    pub agents: Vec<AgentName>,
}

/// The merged result of all agent outcomes for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    pub suggestions: Vec<AttributedSuggestion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<AgentFailure>,
}

impl ConsolidatedReport {
    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty() && self.failures.is_empty()
    }

    pub fn failure_for(&self, agent: &AgentName) -> Option<&AgentFailure> {
        self.failures.iter().find(|f| &f.agent == agent)
    }

    /// Number of merged suggestions the given agent contributed to.
    pub fn contributions(&self, agent: &AgentName) -> usize {
        self.suggestions
            .iter()
            .filter(|s| s.agents.contains(agent))
            .count()
    }
}

/// A persisted analysis, one per completed orchestration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub code_snippet: String,
    /// Serialized [`ConsolidatedReport`].
    pub suggestions: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Request body shared by the orchestrator and the agents: `{"code": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeInput {
    pub code: String,
}

/// Successful agent response body: `{"suggestions": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub suggestions: Vec<Suggestion>,
}
