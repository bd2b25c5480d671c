//! PostgreSQL implementation of the job repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crosspost_core::{JobFilter, JobStatus, Platform, PublishPayload, PublishingJob, ResourceId};
use sqlx::PgPool;

use crate::repo::job::{JobRepo, JobUpdate};
use crate::{DbError, DbResult};

/// A publishing job row as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
struct JobRow {
    id: uuid::Uuid,
    owner: uuid::Uuid,
    platform: String,
    payload: serde_json::Value,
    scheduled_time: Option<DateTime<Utc>>,
    status: String,
    error_log: Option<String>,
    external_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for PublishingJob {
    type Error = DbError;

    fn try_from(row: JobRow) -> DbResult<Self> {
        let platform: Platform = row
            .platform
            .parse()
            .map_err(|e: String| DbError::InvalidRecord(format!("job {}: {e}", row.id)))?;
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|e: String| DbError::InvalidRecord(format!("job {}: {e}", row.id)))?;
        let payload: PublishPayload = serde_json::from_value(row.payload)
            .map_err(|e| DbError::InvalidRecord(format!("job {}: bad payload: {e}", row.id)))?;
        Ok(PublishingJob {
            id: ResourceId::from_uuid(row.id),
            owner: ResourceId::from_uuid(row.owner),
            platform,
            payload,
            scheduled_time: row.scheduled_time,
            status,
            error_log: row.error_log,
            external_id: row.external_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL implementation of [`JobRepo`].
pub struct PgJobRepo {
    pool: PgPool,
}

impl PgJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepo for PgJobRepo {
    async fn create(
        &self,
        owner: ResourceId,
        platform: Platform,
        payload: PublishPayload,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> DbResult<PublishingJob> {
        let payload = serde_json::to_value(&payload)
            .map_err(|e| DbError::InvalidRecord(format!("unserializable payload: {e}")))?;
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO publishing_jobs
                (id, owner, platform, payload, scheduled_time, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'queued', NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(uuid::Uuid::now_v7())
        .bind(owner.as_uuid())
        .bind(platform.as_str())
        .bind(payload)
        .bind(scheduled_time)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get(&self, id: ResourceId) -> DbResult<PublishingJob> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM publishing_jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("job {}", id)))?;
        row.try_into()
    }

    async fn transition(
        &self,
        id: ResourceId,
        expected: &[JobStatus],
        update: JobUpdate,
    ) -> DbResult<Option<PublishingJob>> {
        let expected: Vec<String> = expected.iter().map(|s| s.as_str().to_string()).collect();
        // COALESCE keeps an external id recorded by an earlier publish.
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE publishing_jobs
            SET status = $3,
                error_log = $4,
                external_id = COALESCE($5, external_id),
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($2)
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(&expected)
        .bind(update.status.as_str())
        .bind(&update.error_log)
        .bind(&update.external_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_by_owner(
        &self,
        owner: ResourceId,
        filter: &JobFilter,
    ) -> DbResult<Vec<PublishingJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM publishing_jobs
            WHERE owner = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR platform = $3)
              AND ($4::date IS NULL OR scheduled_time::date >= $4)
              AND ($5::date IS NULL OR scheduled_time::date <= $5)
            ORDER BY scheduled_time DESC NULLS LAST, created_at DESC
            "#,
        )
        .bind(owner.as_uuid())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.platform.map(|p| p.as_str()))
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> DbResult<Vec<PublishingJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM publishing_jobs
            WHERE status = 'queued'
              AND (scheduled_time IS NULL OR scheduled_time <= $1)
            ORDER BY scheduled_time ASC NULLS FIRST, created_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
