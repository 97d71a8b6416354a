//! SQLite knowledge store with FTS5 full-text search.
//!
//! Uses a single SQLite database file with two tables:
//! - `knowledge_items`: the item records
//! - `knowledge_fts`: FTS5 index over `processed_content`, ranked with BM25
//!
//! Triggers keep the FTS index in sync on insert/delete/update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secondbrain_core::error::StoreError;
use secondbrain_core::knowledge::{
    ExcerptQuery, ItemStatus, KnowledgeItem, KnowledgeStore, Modality, NewKnowledgeItem,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A SQLite knowledge store with FTS5 full-text search.
pub struct SqliteKnowledgeStore {
    pool: SqlitePool,
}

impl SqliteKnowledgeStore {
    /// Open (or create) a store at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite knowledge store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        // Integer rowid alias so the FTS table can reference rows
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_items (
                iid               INTEGER PRIMARY KEY AUTOINCREMENT,
                id                TEXT UNIQUE NOT NULL,
                title             TEXT NOT NULL,
                modality          TEXT NOT NULL,
                original_content  TEXT NOT NULL,
                processed_content TEXT,
                status            TEXT NOT NULL DEFAULT 'pending',
                source_timestamp  TEXT,
                created_at        TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("knowledge_items table: {e}")))?;

        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS knowledge_fts USING fts5(
                processed_content,
                content='knowledge_items',
                content_rowid='iid',
                tokenize='porter unicode61'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("FTS5 table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS knowledge_ai AFTER INSERT ON knowledge_items BEGIN
                INSERT INTO knowledge_fts(rowid, processed_content)
                VALUES (new.iid, new.processed_content);
            END
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("insert trigger: {e}")))?;

        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS knowledge_ad AFTER DELETE ON knowledge_items BEGIN
                INSERT INTO knowledge_fts(knowledge_fts, rowid, processed_content)
                VALUES ('delete', old.iid, old.processed_content);
            END
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("delete trigger: {e}")))?;

        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS knowledge_au
            AFTER UPDATE OF processed_content ON knowledge_items BEGIN
                INSERT INTO knowledge_fts(knowledge_fts, rowid, processed_content)
                VALUES ('delete', old.iid, old.processed_content);
                INSERT INTO knowledge_fts(rowid, processed_content)
                VALUES (new.iid, new.processed_content);
            END
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("update trigger: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_knowledge_created_at ON knowledge_items(created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("created_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<KnowledgeItem, StoreError> {
        let column = |name: &str, e: sqlx::Error| StoreError::QueryFailed(format!("{name} column: {e}"));

        let id: String = row.try_get("id").map_err(|e| column("id", e))?;
        let title: String = row.try_get("title").map_err(|e| column("title", e))?;
        let modality: String = row.try_get("modality").map_err(|e| column("modality", e))?;
        let original_content: String = row
            .try_get("original_content")
            .map_err(|e| column("original_content", e))?;
        let processed_content: Option<String> = row
            .try_get("processed_content")
            .map_err(|e| column("processed_content", e))?;
        let status: String = row.try_get("status").map_err(|e| column("status", e))?;
        let source_timestamp: Option<String> = row
            .try_get("source_timestamp")
            .map_err(|e| column("source_timestamp", e))?;
        let created_at: String = row.try_get("created_at").map_err(|e| column("created_at", e))?;

        let modality = Modality::from_str(&modality).map_err(StoreError::QueryFailed)?;
        let status = ItemStatus::from_str(&status).map_err(StoreError::QueryFailed)?;

        Ok(KnowledgeItem {
            id,
            title,
            modality,
            original_content,
            processed_content,
            status,
            source_timestamp: source_timestamp.as_deref().and_then(parse_timestamp),
            created_at: parse_timestamp(&created_at).unwrap_or_else(Utc::now),
        })
    }

    /// Build a safe FTS5 query from search terms.
    ///
    /// Each term is stripped to alphanumerics and quoted; any term may match.
    fn sanitize_fts_query(terms: &[String]) -> String {
        terms
            .iter()
            .map(|w| {
                w.chars()
                    .filter(|c| c.is_alphanumeric() || *c == '_')
                    .collect::<String>()
            })
            .filter(|clean| !clean.is_empty())
            .map(|clean| format!("\"{clean}\""))
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert(&self, item: NewKnowledgeItem) -> Result<KnowledgeItem, StoreError> {
        let record = KnowledgeItem {
            id: Uuid::new_v4().to_string(),
            title: item.title,
            modality: item.modality,
            original_content: item.original_content,
            processed_content: item.processed_content,
            status: item.status,
            source_timestamp: item.source_timestamp,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO knowledge_items
                (id, title, modality, original_content, processed_content, status,
                 source_timestamp, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(record.modality.as_str())
        .bind(&record.original_content)
        .bind(&record.processed_content)
        .bind(record.status.as_str())
        .bind(record.source_timestamp.map(|t| t.to_rfc3339()))
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;

        debug!(id = %record.id, modality = %record.modality, "Stored knowledge item");
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeItem>, StoreError> {
        let row = sqlx::query("SELECT * FROM knowledge_items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET by ID: {e}")))?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn list(&self) -> Result<Vec<KnowledgeItem>, StoreError> {
        let rows = sqlx::query("SELECT * FROM knowledge_items ORDER BY created_at DESC, iid DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("LIST: {e}")))?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM knowledge_items WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_status(&self, id: &str, status: ItemStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE knowledge_items SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE status failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn complete(&self, id: &str, processed_content: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE knowledge_items SET processed_content = ?2, status = 'completed' WHERE id = ?1",
        )
        .bind(id)
        .bind(processed_content)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE content failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn search_completed(&self, query: ExcerptQuery) -> Result<Vec<KnowledgeItem>, StoreError> {
        let fts_query = Self::sanitize_fts_query(&query.terms);
        if fts_query.is_empty() || query.limit == 0 {
            return Ok(vec![]);
        }

        let rows = sqlx::query(
            r#"
            SELECT k.*, bm25(knowledge_fts) AS rank
            FROM knowledge_fts f
            JOIN knowledge_items k ON k.iid = f.rowid
            WHERE knowledge_fts MATCH ?1
              AND k.status = 'completed'
            ORDER BY rank, k.iid
            LIMIT ?2
            "#,
        )
        .bind(&fts_query)
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("FTS5 search: {e}")))?;

        rows.iter().map(Self::row_to_item).collect()
    }
}
