//! HTTP surface of the orchestrator.
//!
//! - `POST /orchestrate-analysis` `{"code": ...}` → consolidated report
//! - `GET /analyses/{id}` → stored analysis record
//! - `GET /health` → liveness and configured agents

use crate::analysis::Orchestrator;
use crate::models::{AnalysisRecord, CodeInput, ConsolidatedReport};
use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct ServerState {
    pub orchestrator: Orchestrator,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub agents: Vec<AgentStatus>,
}

#[derive(Debug, Serialize)]
pub struct AgentStatus {
    pub name: String,
    pub enabled: bool,
}

pub type ApiError = (StatusCode, Json<Value>);
pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

pub async fn handle_health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    let agents = state
        .orchestrator
        .registry()
        .roster()
        .map(|(name, enabled)| AgentStatus {
            name: name.to_string(),
            enabled,
        })
        .collect();

    Json(HealthResponse {
        status: "ok",
        agents,
    })
}

pub async fn handle_orchestrate(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<CodeInput>,
) -> ApiResult<ConsolidatedReport> {
    info!(bytes = payload.code.len(), "Received orchestration request");

    match state.orchestrator.run(payload.code.into()).await {
        Ok(orchestration) => Ok(Json(orchestration.report)),
        Err(e) => {
            error!(error = %e, "Consolidation failed");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to consolidate agent results: {}", e),
            ))
        }
    }
}

pub async fn handle_get_analysis(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> ApiResult<AnalysisRecord> {
    let Some(store) = state.orchestrator.store() else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "analysis recording is disabled",
        ));
    };

    match store.get(id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("analysis {} not found", id),
        )),
        Err(e) => {
            error!(error = %e, id, "Failed to read analysis");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/orchestrate-analysis", post(handle_orchestrate))
        .route("/analyses/{id}", get(handle_get_analysis))
        .with_state(state)
}

pub async fn run_server(orchestrator: Orchestrator, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}")
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid server bind address '{}:{}'", host, port))?;

    let state = Arc::new(ServerState { orchestrator });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "Listening (POST /orchestrate-analysis, GET /health)");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server runtime failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRegistry;
    use crate::config::{AgentConfig, ClientConfig};
    use crate::store::{AnalysisStore, SqliteStore};
    use crate::testing::{spawn_stub, unused_local_url, FailingStore};

    fn suggestions_stub(body: Value) -> Router {
        Router::new().route(
            "/analyze",
            post(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        )
    }

    fn delayed_stub(delay: std::time::Duration, body: Value) -> Router {
        Router::new().route(
            "/analyze",
            post(move || {
                let body = body.clone();
                async move {
                    tokio::time::sleep(delay).await;
                    Json(body)
                }
            }),
        )
    }

    async fn agent_config(name: &str, router: Router) -> AgentConfig {
        let base = spawn_stub(router).await;
        AgentConfig {
            name: name.to_string(),
            url: Some(format!("{base}/analyze")),
            timeout_seconds: None,
        }
    }

    async fn serve(agents: Vec<AgentConfig>, store: Option<Arc<dyn AnalysisStore>>) -> String {
        let registry = AgentRegistry::from_config(&agents, &ClientConfig { timeout_seconds: 1 })
            .unwrap();
        let orchestrator = Orchestrator::new(Arc::new(registry), store);
        spawn_stub(build_router(Arc::new(ServerState { orchestrator }))).await
    }

    async fn orchestrate(base: &str, code: &str) -> (StatusCode, Value) {
        let response = reqwest::Client::new()
            .post(format!("{base}/orchestrate-analysis"))
            .json(&json!({ "code": code }))
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_end_to_end_with_malformed_and_duplicate_agents() {
        let security = agent_config(
            "security",
            suggestions_stub(json!({"suggestions": [
                {"title": "Linha muito longa", "explanation": "Excede 79 colunas.", "code_example": "sec()"},
                {"title": "E1", "explanation": "desc1", "code_example": "ex1"}
            ]})),
        )
        .await;
        let performance = agent_config(
            "performance",
            suggestions_stub(json!({"suggestions": [
                {"title": "linha muito longa", "explanation": "Excede 79 colunas.", "code_example": "perf()"}
            ]})),
        )
        .await;
        let codestyle = agent_config("codestyle", suggestions_stub(json!({"result": "ok"}))).await;
        let disabled = AgentConfig::disabled("docs");

        let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
        let base = serve(
            vec![security, performance, codestyle, disabled],
            Some(store.clone() as Arc<dyn AnalysisStore>),
        )
        .await;

        let (status, body) = orchestrate(&base, "print('x' * 200)").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["suggestions"],
            json!([
                {
                    "title": "Linha muito longa",
                    "explanation": "Excede 79 colunas.",
                    "code_example": "sec()",
                    "agents": ["security", "performance"]
                },
                {
                    "title": "E1",
                    "explanation": "desc1",
                    "code_example": "ex1",
                    "agents": ["security"]
                }
            ])
        );
        let failures = body["failures"].as_array().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0]["agent"], "codestyle");
        assert_eq!(failures[0]["kind"], "malformed_response");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_each_agent_has_its_own_deadline() {
        use std::time::{Duration, Instant};

        let mut security = agent_config(
            "security",
            delayed_stub(
                Duration::from_secs(5),
                json!({"suggestions": [
                    {"title": "E1", "explanation": "desc1", "code_example": "ex1"}
                ]}),
            ),
        )
        .await;
        security.timeout_seconds = Some(1);
        let mut performance = agent_config(
            "performance",
            delayed_stub(
                Duration::from_millis(1500),
                json!({"suggestions": [
                    {"title": "P1", "explanation": "desc2", "code_example": "ex2"}
                ]}),
            ),
        )
        .await;
        performance.timeout_seconds = Some(3);
        let base = serve(vec![security, performance], None).await;

        let started = Instant::now();
        let (status, body) = orchestrate(&base, "x = 1").await;
        let elapsed = started.elapsed();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["suggestions"],
            json!([{
                "title": "P1",
                "explanation": "desc2",
                "code_example": "ex2",
                "agents": ["performance"]
            }])
        );
        assert_eq!(body["failures"][0]["agent"], "security");
        assert_eq!(body["failures"][0]["kind"], "timeout");
        assert!(elapsed >= Duration::from_millis(1400), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(3), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_unreachable_agent_is_a_failure_entry() {
        let security = AgentConfig {
            name: "security".to_string(),
            url: Some(unused_local_url().await),
            timeout_seconds: None,
        };
        let performance =
            agent_config("performance", suggestions_stub(json!({"suggestions": []}))).await;
        let base = serve(vec![security, performance], None).await;

        let (status, body) = orchestrate(&base, "x = 1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suggestions"], json!([]));
        assert_eq!(body["failures"][0]["agent"], "security");
        assert_eq!(body["failures"][0]["kind"], "unreachable");
    }

    #[tokio::test]
    async fn test_no_agents_returns_empty_report() {
        let base = serve(vec![AgentConfig::disabled("security")], None).await;

        let (status, body) = orchestrate(&base, "x = 1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"suggestions": []}));
    }

    #[tokio::test]
    async fn test_store_down_does_not_change_response() {
        let security = agent_config(
            "security",
            suggestions_stub(json!({"suggestions": [
                {"title": "E1", "explanation": "desc1", "code_example": "ex1"}
            ]})),
        )
        .await;
        let base = serve(
            vec![security],
            Some(Arc::new(FailingStore) as Arc<dyn AnalysisStore>),
        )
        .await;

        let (status, body) = orchestrate(&base, "x = 1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suggestions"][0]["title"], "E1");
    }

    #[tokio::test]
    async fn test_missing_code_field_is_rejected() {
        let base = serve(vec![], None).await;
        let response = reqwest::Client::new()
            .post(format!("{base}/orchestrate-analysis"))
            .json(&json!({ "snippet": "x = 1" }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_health_lists_agents() {
        let security =
            agent_config("security", suggestions_stub(json!({"suggestions": []}))).await;
        let base = serve(vec![security, AgentConfig::disabled("performance")], None).await;

        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(
            body,
            json!({
                "status": "ok",
                "agents": [
                    {"name": "security", "enabled": true},
                    {"name": "performance", "enabled": false}
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_get_analysis() {
        let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
        let base = serve(vec![], Some(store.clone() as Arc<dyn AnalysisStore>)).await;
        orchestrate(&base, "x = 1").await;

        let found = reqwest::get(format!("{base}/analyses/1")).await.unwrap();
        assert_eq!(found.status().as_u16(), 200);
        let record: Value = found.json().await.unwrap();
        assert_eq!(record["code_snippet"], "x = 1");
        assert_eq!(record["suggestions"], json!({"suggestions": []}));

        let missing = reqwest::get(format!("{base}/analyses/42")).await.unwrap();
        assert_eq!(missing.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_get_analysis_without_store() {
        let base = serve(vec![], None).await;
        let response = reqwest::get(format!("{base}/analyses/1")).await.unwrap();
        assert_eq!(response.status().as_u16(), 503);
    }
}
