//! Persistence of completed analyses.
//!
//! Recording is a best-effort side effect: [`persist`] logs failures and
//! never lets them reach the caller. Records are only ever inserted.

use crate::models::{AnalysisRecord, CodeSnippet, ConsolidatedReport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored record {id} is corrupt: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Insert-only store for analysis records.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Insert one record and return its id.
    async fn insert(
        &self,
        code_snippet: &str,
        suggestions: &serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Result<i64, PersistenceError>;

    /// Fetch a record by id.
    async fn get(&self, id: i64) -> Result<Option<AnalysisRecord>, PersistenceError>;
}

/// Record the snippet and its report. Returns the record id, or `None` if
/// the write failed (the error is logged, not returned).
pub async fn persist(
    store: &dyn AnalysisStore,
    snippet: &CodeSnippet,
    report: &ConsolidatedReport,
) -> Option<i64> {
    match record(store, snippet, report).await {
        Ok(id) => {
            info!(record_id = id, "Analysis recorded");
            Some(id)
        }
        Err(e) => {
            error!(error = %e, "Failed to record analysis");
            None
        }
    }
}

async fn record(
    store: &dyn AnalysisStore,
    snippet: &CodeSnippet,
    report: &ConsolidatedReport,
) -> Result<i64, PersistenceError> {
    let suggestions = serde_json::to_value(report)?;
    store
        .insert(snippet.as_str(), &suggestions, Utc::now())
        .await
}

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS analysis_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code_snippet TEXT NOT NULL,
    suggestions TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

/// SQLite-backed store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database and ensure the table exists.
    pub async fn connect(database_url: &str) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // The single connection must never be recycled: an in-memory
        // database lives exactly as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        debug!(database_url, "Analysis store ready");

        Ok(Self { pool })
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<i64, PersistenceError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM analysis_history")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

#[async_trait]
impl AnalysisStore for SqliteStore {
    async fn insert(
        &self,
        code_snippet: &str,
        suggestions: &serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Result<i64, PersistenceError> {
        let result = sqlx::query(
            "INSERT INTO analysis_history (code_snippet, suggestions, created_at) VALUES (?, ?, ?)",
        )
        .bind(code_snippet)
        .bind(suggestions.to_string())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn get(&self, id: i64) -> Result<Option<AnalysisRecord>, PersistenceError> {
        let row = sqlx::query(
            "SELECT id, code_snippet, suggestions, created_at FROM analysis_history WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let suggestions: String = row.try_get("suggestions")?;
        let created_at: String = row.try_get("created_at")?;
        let corrupt = |reason: String| PersistenceError::Corrupt { id, reason };

        Ok(Some(AnalysisRecord {
            id: row.try_get("id")?,
            code_snippet: row.try_get("code_snippet")?,
            suggestions: serde_json::from_str(&suggestions).map_err(|e| corrupt(e.to_string()))?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| corrupt(e.to_string()))?
                .with_timezone(&Utc),
        }))
    }
}
