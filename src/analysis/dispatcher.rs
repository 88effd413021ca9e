//! Concurrent fan-out of one snippet to every enabled agent.

use crate::agent::AgentRegistry;
use crate::models::{AgentName, AgentOutcome, CodeSnippet, FailureKind};
use tokio::task::JoinHandle;
use tracing::debug;

/// An in-flight agent call, tagged with the agent that owns it.
///
/// Dropping it aborts the call, so abandoning a request cancels every
/// agent call it started.
#[derive(Debug)]
pub struct PendingOutcome {
    agent: AgentName,
    handle: JoinHandle<AgentOutcome>,
}

impl PendingOutcome {
    pub fn new(agent: AgentName, handle: JoinHandle<AgentOutcome>) -> Self {
        Self { agent, handle }
    }

    #[cfg(test)]
    pub fn agent(&self) -> &AgentName {
        &self.agent
    }

    /// Wait for the call to finish. A call whose task died still yields an outcome.
    pub async fn settle(mut self) -> (AgentName, AgentOutcome) {
        let outcome = match (&mut self.handle).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                AgentOutcome::failure(FailureKind::Timeout, "agent call was cancelled")
            }
            Err(e) => AgentOutcome::failure(
                FailureKind::Internal,
                format!("agent call aborted: {}", e),
            ),
        };
        (self.agent.clone(), outcome)
    }
}

impl Drop for PendingOutcome {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start one analysis per enabled agent. All calls run concurrently and
/// independently; disabled agents are skipped entirely.
pub fn dispatch(registry: &AgentRegistry, snippet: &CodeSnippet) -> Vec<PendingOutcome> {
    registry
        .lookup()
        .map(|(name, client)| {
            debug!(agent = %name, "Dispatching analysis");
            let client = client.clone();
            let snippet = snippet.clone();
            let handle = tokio::spawn(async move { client.analyze(&snippet).await });
            PendingOutcome::new(name.clone(), handle)
        })
        .collect()
}
