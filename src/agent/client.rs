//! Request/response exchange with a single specialist agent.
//!
//! Every way a call can go wrong is folded into an [`AgentOutcome::Failure`];
//! nothing escapes this boundary as an error.

use crate::models::{AgentOutcome, AgentResponse, CodeInput, CodeSnippet, FailureKind};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Maximum number of characters of a response body kept in failure details.
pub const EXCERPT_CHARS: usize = 500;

/// A specialist agent capable of reviewing a snippet.
///
/// One implementation is registered per agent; the dispatcher never
/// branches on agent names.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Analyze the snippet. Never fails: failures are reported as outcomes.
    async fn analyze(&self, snippet: &CodeSnippet) -> AgentOutcome;
}

/// Agent reachable over HTTP at `POST <endpoint>` with `{"code": ...}`.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    endpoint: String,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl HttpAgentClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, http_client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            http_client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn exchange(&self, snippet: &CodeSnippet) -> AgentOutcome {
        let request = CodeInput {
            code: snippet.as_str().to_string(),
        };

        let response = match self
            .http_client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return self.transport_failure(&e),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return self.transport_failure(&e),
        };

        if !status.is_success() {
            return AgentOutcome::failure(
                FailureKind::RemoteError,
                format!("{}: {}", status, excerpt(&body)),
            );
        }

        match serde_json::from_str::<AgentResponse>(&body) {
            Ok(parsed) => {
                debug!(
                    endpoint = %self.endpoint,
                    suggestions = parsed.suggestions.len(),
                    "Agent response parsed"
                );
                AgentOutcome::success(parsed.suggestions)
            }
            Err(e) => AgentOutcome::failure(
                FailureKind::MalformedResponse,
                format!("{}: {}", e, excerpt(&body)),
            ),
        }
    }

    fn transport_failure(&self, error: &reqwest::Error) -> AgentOutcome {
        if error.is_timeout() {
            AgentOutcome::failure(
                FailureKind::Timeout,
                format!("no response within {:?}", self.timeout),
            )
        } else {
            AgentOutcome::failure(
                FailureKind::Unreachable,
                format!("{}: {}", self.endpoint, error_chain(error)),
            )
        }
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn analyze(&self, snippet: &CodeSnippet) -> AgentOutcome {
        match tokio::time::timeout(self.timeout, self.exchange(snippet)).await {
            Ok(outcome) => outcome,
            Err(_) => AgentOutcome::failure(
                FailureKind::Timeout,
                format!("no response within {:?}", self.timeout),
            ),
        }
    }
}

/// First [`EXCERPT_CHARS`] characters of a body, marked when truncated.
pub fn excerpt(body: &str) -> String {
    let body = body.trim();
    let mut chars = body.char_indices();
    match chars.nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
