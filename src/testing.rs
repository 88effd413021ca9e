//! Test doubles shared by unit tests: in-process agents, a failing store,
//! and stub agent services served over real HTTP.

use crate::agent::AgentClient;
use crate::models::{AgentOutcome, AnalysisRecord, CodeSnippet, FailureKind, Suggestion};
use crate::store::{AnalysisStore, PersistenceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Agent that always returns the same outcome.
pub struct StaticAgent(AgentOutcome);

impl StaticAgent {
    pub fn empty() -> Self {
        Self(AgentOutcome::success(vec![]))
    }

    pub fn with(suggestions: Vec<Suggestion>) -> Self {
        Self(AgentOutcome::success(suggestions))
    }

    pub fn failing(kind: FailureKind) -> Self {
        Self(AgentOutcome::failure(kind, format!("stub {:?}", kind)))
    }

    pub fn outcome(&self) -> AgentOutcome {
        self.0.clone()
    }
}

#[async_trait]
impl AgentClient for StaticAgent {
    async fn analyze(&self, _snippet: &CodeSnippet) -> AgentOutcome {
        self.0.clone()
    }
}

/// Agent that answers after a fixed delay.
pub struct DelayedAgent {
    delay: Duration,
    outcome: AgentOutcome,
}

impl DelayedAgent {
    pub fn new(delay: Duration, outcome: AgentOutcome) -> Self {
        Self { delay, outcome }
    }
}

#[async_trait]
impl AgentClient for DelayedAgent {
    async fn analyze(&self, _snippet: &CodeSnippet) -> AgentOutcome {
        tokio::time::sleep(self.delay).await;
        self.outcome.clone()
    }
}

/// Agent whose task panics.
pub struct PanickingAgent;

#[async_trait]
impl AgentClient for PanickingAgent {
    async fn analyze(&self, _snippet: &CodeSnippet) -> AgentOutcome {
        panic!("agent exploded");
    }
}

/// Agent that never answers and signals when it starts and when its call is dropped.
#[derive(Clone)]
pub struct GatedAgent {
    started: Arc<Notify>,
    dropped: Arc<Notify>,
}

struct DropSignal(Arc<Notify>);

impl Drop for DropSignal {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}

impl GatedAgent {
    pub fn new() -> Self {
        Self {
            started: Arc::new(Notify::new()),
            dropped: Arc::new(Notify::new()),
        }
    }

    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub async fn wait_dropped(&self) {
        self.dropped.notified().await;
    }
}

#[async_trait]
impl AgentClient for GatedAgent {
    async fn analyze(&self, _snippet: &CodeSnippet) -> AgentOutcome {
        let _signal = DropSignal(self.dropped.clone());
        self.started.notify_one();
        std::future::pending::<AgentOutcome>().await
    }
}

/// Store that is always unavailable.
pub struct FailingStore;

#[async_trait]
impl AnalysisStore for FailingStore {
    async fn insert(
        &self,
        _code_snippet: &str,
        _suggestions: &serde_json::Value,
        _created_at: DateTime<Utc>,
    ) -> Result<i64, PersistenceError> {
        Err(PersistenceError::Database(sqlx::Error::PoolClosed))
    }

    async fn get(&self, _id: i64) -> Result<Option<AnalysisRecord>, PersistenceError> {
        Err(PersistenceError::Database(sqlx::Error::PoolClosed))
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// URL of a local port with nothing listening on it.
pub async fn unused_local_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/analyze", addr)
}
