//! Publishing queue endpoints.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::auth::Owner;
use crate::error::ApiError;
use crosspost_core::{JobFilter, JobStatus, Platform, PublishPayload, PublishingJob, ResourceId};
use crosspost_queue::BulkRetryReport;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs).post(enqueue_job))
        .route("/retry", post(bulk_retry))
        .route("/{id}/retry", post(retry_job))
        .route("/{id}/publish", post(manual_publish))
        .route("/{id}/cancel", post(cancel_job))
}

#[derive(Debug, Deserialize)]
struct ListJobsQuery {
    status: Option<String>,
    platform: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

impl ListJobsQuery {
    /// `all` and an absent param both mean unfiltered; anything else must
    /// name a known value.
    fn into_filter(self) -> Result<JobFilter, ApiError> {
        let status = match self.status.as_deref() {
            None | Some("all") => None,
            Some(value) => Some(value.parse::<JobStatus>().map_err(ApiError::BadRequest)?),
        };
        let platform = match self.platform.as_deref() {
            None | Some("all") => None,
            Some(value) => Some(value.parse::<Platform>().map_err(ApiError::BadRequest)?),
        };
        Ok(JobFilter {
            status,
            platform,
            date_from: self.from,
            date_to: self.to,
        })
    }
}

#[derive(Debug, Serialize)]
struct JobResponse {
    id: String,
    platform: String,
    status: String,
    scheduled_time: Option<String>,
    error_log: Option<String>,
    external_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<PublishingJob> for JobResponse {
    fn from(job: PublishingJob) -> Self {
        Self {
            id: job.id.to_string(),
            platform: job.platform.to_string(),
            status: job.status.to_string(),
            scheduled_time: job.scheduled_time.map(|t| t.to_rfc3339()),
            error_log: job.error_log,
            external_id: job.external_id,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

async fn list_jobs(
    State(state): State<AppState>,
    Owner(ctx): Owner,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<JobResponse>>, ApiError> {
    let filter = query.into_filter()?;
    let jobs = state.engine.list_jobs(&ctx, &filter).await?;
    Ok(Json(jobs.into_iter().map(JobResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
struct EnqueueRequest {
    platform: Platform,
    payload: PublishPayload,
    scheduled_time: Option<DateTime<Utc>>,
}

async fn enqueue_job(
    State(state): State<AppState>,
    Owner(ctx): Owner,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state
        .engine
        .enqueue(&ctx, req.platform, req.payload, req.scheduled_time)
        .await?;
    Ok(Json(job.into()))
}

async fn retry_job(
    State(state): State<AppState>,
    Owner(ctx): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state
        .engine
        .retry_job(&ctx, ResourceId::from_uuid(id))
        .await?;
    Ok(Json(job.into()))
}

#[derive(Debug, Deserialize)]
struct BulkRetryRequest {
    ids: Vec<Uuid>,
}

async fn bulk_retry(
    State(state): State<AppState>,
    Owner(ctx): Owner,
    Json(req): Json<BulkRetryRequest>,
) -> Result<Json<BulkRetryReport>, ApiError> {
    let ids: Vec<ResourceId> = req.ids.into_iter().map(ResourceId::from_uuid).collect();
    let report = state.engine.bulk_retry(&ctx, &ids).await?;
    Ok(Json(report))
}

async fn manual_publish(
    State(state): State<AppState>,
    Owner(ctx): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state
        .engine
        .manual_publish(&ctx, ResourceId::from_uuid(id))
        .await?;
    Ok(Json(job.into()))
}

async fn cancel_job(
    State(state): State<AppState>,
    Owner(ctx): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state
        .engine
        .cancel_job(&ctx, ResourceId::from_uuid(id))
        .await?;
    Ok(Json(job.into()))
}
