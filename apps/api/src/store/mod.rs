//! Candidate persistence.
//!
//! Records live in a single `candidatures` table: a few indexed columns for
//! lookups plus the full record as `jsonb`, so downstream consumers read the
//! same French-keyed document the pipeline produced.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::record::CandidateRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Seam between the ingestion pipeline and whatever holds the records.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn find_one(&self, job: &str, name: &str)
        -> Result<Option<CandidateRecord>, StoreError>;

    /// Inserts a record unless one with the same job and candidate name
    /// already exists. Returns whether a row was written.
    async fn insert_one(&self, record: &CandidateRecord) -> Result<bool, StoreError>;

    /// Distinct values of one top-level record field.
    async fn distinct(&self, field: &str) -> Result<Vec<String>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    async fn update_status(&self, id: Uuid, status: i32) -> Result<(), StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

pub struct PgCandidateStore {
    pool: PgPool,
}

impl PgCandidateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candidatures (
                id UUID PRIMARY KEY,
                job TEXT NOT NULL,
                nom TEXT NOT NULL,
                date TIMESTAMPTZ,
                statut INT NOT NULL DEFAULT 0,
                data JSONB NOT NULL,
                cv BYTEA
            )
            "#,
        )
        .execute(pool)
        .await?;
        info!("candidatures table ready");
        Ok(())
    }
}

#[async_trait]
impl CandidateStore for PgCandidateStore {
    async fn find_one(
        &self,
        job: &str,
        name: &str,
    ) -> Result<Option<CandidateRecord>, StoreError> {
        let row = sqlx::query("SELECT data FROM candidatures WHERE job = $1 AND nom = $2")
            .bind(job)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let data: serde_json::Value = row.try_get("data")?;
                Ok(Some(serde_json::from_value(data)?))
            }
            None => Ok(None),
        }
    }

    async fn insert_one(&self, record: &CandidateRecord) -> Result<bool, StoreError> {
        // Duplicate suppression only applies when both keys carry a real
        // value; placeholder rows are always kept.
        if !record.job.is_empty() && !record.name.is_empty() {
            if self.find_one(&record.job, &record.name).await?.is_some() {
                warn!(
                    "skipping duplicate application: {} / {}",
                    record.job, record.name
                );
                return Ok(false);
            }
        }

        let data = serde_json::to_value(record)?;
        sqlx::query(
            r#"
            INSERT INTO candidatures (id, job, nom, date, statut, data, cv)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.job)
        .bind(&record.name)
        .bind(record.date)
        .bind(record.status)
        .bind(data)
        .bind(record.cv.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(true)
    }

    async fn distinct(&self, field: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT DISTINCT data->>$1 AS value FROM candidatures WHERE data->>$1 IS NOT NULL ORDER BY value",
        )
        .bind(field)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.try_get("value").ok())
            .collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM candidatures")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update_status(&self, id: Uuid, status: i32) -> Result<(), StoreError> {
        // The jsonb copy is what readers see, keep it in sync with the column.
        sqlx::query(
            r#"
            UPDATE candidatures
            SET statut = $2, data = jsonb_set(data, '{Statut}', to_jsonb($2::int))
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM candidatures WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
