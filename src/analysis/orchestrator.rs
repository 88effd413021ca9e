//! One orchestration: dispatch, collect, consolidate, then record.

use crate::agent::AgentRegistry;
use crate::analysis::collector::collect;
use crate::analysis::consolidator::{consolidate, ConsolidationError};
use crate::analysis::dispatcher::dispatch;
use crate::models::{CodeSnippet, ConsolidatedReport};
use crate::store::{persist, AnalysisStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Result of a successful orchestration.
#[derive(Debug, Clone)]
pub struct Orchestration {
    pub report: ConsolidatedReport,
    /// Id of the stored record, `None` if recording is disabled or failed.
    pub record_id: Option<i64>,
    /// Number of agents the snippet was dispatched to.
    pub dispatched: usize,
    pub duration_seconds: f64,
}

/// Explicit context shared by every request: the registry and the optional store.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    store: Option<Arc<dyn AnalysisStore>>,
}

impl Orchestrator {
    pub fn new(registry: Arc<AgentRegistry>, store: Option<Arc<dyn AnalysisStore>>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn store(&self) -> Option<&Arc<dyn AnalysisStore>> {
        self.store.as_ref()
    }

    /// Run every enabled agent on the snippet and merge their outcomes.
    ///
    /// Fails only when consolidation fails; agent and store failures are
    /// reported in (or left out of) the result instead.
    pub async fn run(&self, snippet: CodeSnippet) -> Result<Orchestration, ConsolidationError> {
        let started = Instant::now();

        let pending = dispatch(&self.registry, &snippet);
        let dispatched = pending.len();
        info!(agents = dispatched, "Starting orchestration");

        let outcomes = collect(pending).await;
        let report = consolidate(&outcomes)?;

        let record_id = match &self.store {
            Some(store) => persist(store.as_ref(), &snippet, &report).await,
            None => None,
        };

        let duration_seconds = started.elapsed().as_secs_f64();
        info!(
            suggestions = report.suggestions.len(),
            failures = report.failures.len(),
            duration_seconds,
            "Orchestration complete"
        );

        Ok(Orchestration {
            report,
            record_id,
            dispatched,
            duration_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentOutcome, FailureKind, Suggestion};
    use crate::store::SqliteStore;
    use crate::testing::{DelayedAgent, FailingStore, StaticAgent};
    use std::time::Duration;

    fn standard_registry(
        security: Arc<dyn crate::agent::AgentClient>,
        performance: Arc<dyn crate::agent::AgentClient>,
        codestyle: Arc<dyn crate::agent::AgentClient>,
    ) -> Arc<AgentRegistry> {
        let mut registry = AgentRegistry::new();
        registry.register("security", security).unwrap();
        registry.register("performance", performance).unwrap();
        registry.register("codestyle", codestyle).unwrap();
        Arc::new(registry)
    }

    async fn memory_store() -> Arc<SqliteStore> {
        Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap())
    }

    #[tokio::test]
    async fn test_all_agents_succeed() {
        let registry = standard_registry(
            Arc::new(StaticAgent::with(vec![Suggestion::new("E1", "desc1", "ex1")])),
            Arc::new(StaticAgent::with(vec![Suggestion::new("P1", "desc2", "ex2")])),
            Arc::new(StaticAgent::empty()),
        );
        let store = memory_store().await;
        let orchestrator =
            Orchestrator::new(registry, Some(store.clone() as Arc<dyn AnalysisStore>));

        let result = orchestrator.run("x = 1".into()).await.unwrap();

        assert_eq!(result.dispatched, 3);
        assert_eq!(result.report.suggestions.len(), 2);
        assert!(result.report.failures.is_empty());
        assert_eq!(result.report.contributions(&"codestyle".into()), 0);
        assert!(result.record_id.is_some());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_agent_failure_is_reported_not_raised() {
        let registry = standard_registry(
            Arc::new(DelayedAgent::new(
                Duration::from_millis(50),
                AgentOutcome::failure(FailureKind::Timeout, "no response within 90s"),
            )),
            Arc::new(StaticAgent::with(vec![Suggestion::new("P1", "desc2", "ex2")])),
            Arc::new(StaticAgent::with(vec![Suggestion::new("S1", "desc3", "ex3")])),
        );
        let orchestrator = Orchestrator::new(registry, None);

        let result = orchestrator.run("x = 1".into()).await.unwrap();

        assert_eq!(result.report.suggestions.len(), 2);
        let failure = result.report.failure_for(&"security".into()).unwrap();
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert_eq!(result.record_id, None);
    }

    #[tokio::test]
    async fn test_every_agent_failing_still_succeeds() {
        let registry = standard_registry(
            Arc::new(StaticAgent::failing(FailureKind::Unreachable)),
            Arc::new(StaticAgent::failing(FailureKind::RemoteError)),
            Arc::new(StaticAgent::failing(FailureKind::MalformedResponse)),
        );
        let orchestrator = Orchestrator::new(registry, None);

        let result = orchestrator.run("x = 1".into()).await.unwrap();
        assert!(result.report.suggestions.is_empty());
        assert_eq!(result.report.failures.len(), 3);
    }

    #[tokio::test]
    async fn test_no_agents_configured() {
        let mut registry = AgentRegistry::new();
        registry.disable("security").unwrap();
        let store = memory_store().await;
        let orchestrator = Orchestrator::new(
            Arc::new(registry),
            Some(store.clone() as Arc<dyn AnalysisStore>),
        );

        let result = orchestrator.run("x = 1".into()).await.unwrap();

        assert_eq!(result.dispatched, 0);
        assert!(result.report.is_empty());
        assert!(result.record_id.is_some());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_down_keeps_full_report() {
        let registry = standard_registry(
            Arc::new(StaticAgent::with(vec![Suggestion::new("E1", "desc1", "ex1")])),
            Arc::new(StaticAgent::with(vec![Suggestion::new("P1", "desc2", "ex2")])),
            Arc::new(StaticAgent::empty()),
        );
        let with_store = Orchestrator::new(
            registry.clone(),
            Some(Arc::new(FailingStore) as Arc<dyn AnalysisStore>),
        );
        let without_store = Orchestrator::new(registry, None);

        let failed = with_store.run("x = 1".into()).await.unwrap();
        let baseline = without_store.run("x = 1".into()).await.unwrap();

        assert_eq!(failed.record_id, None);
        assert_eq!(failed.report, baseline.report);
    }
}
