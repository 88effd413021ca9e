//! All-complete join over dispatched agent calls.

use crate::analysis::dispatcher::PendingOutcome;
use crate::models::{AgentName, AgentOutcome};
use futures::future::join_all;
use tracing::{debug, info, warn};

/// Terminal outcomes in dispatch (registry) order, one per dispatched agent.
pub type AgentOutcomes = Vec<(AgentName, AgentOutcome)>;

/// Wait until every call has reached a terminal state.
///
/// There is no early return: a failing agent never prevents the others'
/// results from being collected. Zero pending calls yields an empty set.
pub async fn collect(pending: Vec<PendingOutcome>) -> AgentOutcomes {
    let outcomes = join_all(pending.into_iter().map(PendingOutcome::settle)).await;

    for (agent, outcome) in &outcomes {
        match outcome {
            AgentOutcome::Success { suggestions } => {
                info!(agent = %agent, suggestions = suggestions.len(), "Agent finished")
            }
            AgentOutcome::Failure { kind, detail } => {
                warn!(agent = %agent, kind = ?kind, detail = %detail, "Agent failed")
            }
        }
    }

    let failed = outcomes.iter().filter(|(_, o)| !o.is_success()).count();
    debug!(settled = outcomes.len(), failed, "All agent calls settled");

    outcomes
}
