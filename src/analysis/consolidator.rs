//! Merging of per-agent outcomes into one consolidated report.
//!
//! Suggestions are flattened in registry order and deduplicated by
//! content: two suggestions are the same finding when their trimmed,
//! case-folded titles and explanations are equal. The first-seen copy is
//! kept (including its `code_example`) and every contributing agent is
//! recorded against it. Failed agents are reported next to the merged list.

use crate::models::{
    AgentFailure, AgentName, AgentOutcome, AttributedSuggestion, ConsolidatedReport, FailureKind,
    Suggestion,
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

/// The outcomes cannot be merged into a structurally valid report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsolidationError {
    #[error("agent '{0}' reported more than one outcome")]
    DuplicateOutcome(AgentName),
}

/// Merge outcomes (in registry order) into a single report.
///
/// Individual agent failures never make this fail. A successful agent whose
/// suggestions are structurally invalid is demoted to a
/// [`FailureKind::MalformedResponse`] failure instead of aborting the merge.
pub fn consolidate(
    outcomes: &[(AgentName, AgentOutcome)],
) -> Result<ConsolidatedReport, ConsolidationError> {
    let mut seen_agents = HashSet::new();
    for (agent, _) in outcomes {
        if !seen_agents.insert(agent) {
            return Err(ConsolidationError::DuplicateOutcome(agent.clone()));
        }
    }

    let mut report = ConsolidatedReport::default();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for (agent, outcome) in outcomes {
        match outcome {
            AgentOutcome::Success { suggestions } => {
                if let Some(failure) = validate(agent, suggestions) {
                    warn!(agent = %agent, detail = %failure.detail, "Demoting invalid agent output");
                    report.failures.push(failure);
                    continue;
                }
                for suggestion in suggestions {
                    merge(&mut report.suggestions, &mut index, agent, suggestion);
                }
            }
            AgentOutcome::Failure { kind, detail } => report.failures.push(AgentFailure {
                agent: agent.clone(),
                kind: *kind,
                detail: detail.clone(),
            }),
        }
    }

    debug!(
        suggestions = report.suggestions.len(),
        failures = report.failures.len(),
        "Consolidated report"
    );

    Ok(report)
}

fn validate(agent: &AgentName, suggestions: &[Suggestion]) -> Option<AgentFailure> {
    suggestions
        .iter()
        .enumerate()
        .find_map(|(i, s)| s.blank_field().map(|field| (i, field)))
        .map(|(i, field)| AgentFailure {
            agent: agent.clone(),
            kind: FailureKind::MalformedResponse,
            detail: format!("suggestion #{} has an empty '{}'", i + 1, field),
        })
}

fn merge(
    merged: &mut Vec<AttributedSuggestion>,
    index: &mut HashMap<(String, String), usize>,
    agent: &AgentName,
    suggestion: &Suggestion,
) {
    let key = suggestion.dedup_key();
    match index.get(&key) {
        Some(&at) => {
            let agents = &mut merged[at].agents;
            if !agents.contains(agent) {
                agents.push(agent.clone());
            }
        }
        None => {
            index.insert(key, merged.len());
            merged.push(AttributedSuggestion {
                suggestion: suggestion.clone(),
                agents: vec![agent.clone()],
            });
        }
    }
}
