//! Job repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crosspost_core::{JobFilter, JobStatus, Platform, PublishPayload, PublishingJob, ResourceId};

use crate::DbResult;

/// Fields written by a guarded status transition.
///
/// `error_log` always overwrites (clearing it on success paths); an absent
/// `external_id` leaves the stored value in place so an id recorded by an
/// earlier publish survives idempotent re-publishes.
#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub error_log: Option<String>,
    pub external_id: Option<String>,
}

impl JobUpdate {
    /// Claim the job for an in-flight dispatch, clearing prior diagnostics.
    pub fn processing() -> Self {
        Self {
            status: JobStatus::Processing,
            error_log: None,
            external_id: None,
        }
    }

    /// Record a successful delivery.
    pub fn published(external_id: String) -> Self {
        Self {
            status: JobStatus::Published,
            error_log: None,
            external_id: Some(external_id),
        }
    }

    /// Record a rejected delivery.
    pub fn failed(reason: String) -> Self {
        Self {
            status: JobStatus::Failed,
            error_log: Some(reason),
            external_id: None,
        }
    }

    /// Withdraw the job.
    pub fn cancelled() -> Self {
        Self {
            status: JobStatus::Cancelled,
            error_log: None,
            external_id: None,
        }
    }
}

/// Durable record of publishing jobs.
///
/// `transition` is the only mutation path for `status` and `error_log`; it is
/// atomic against concurrent callers, so two simultaneous dispatch attempts
/// for one id resolve to exactly one winner.
#[async_trait]
pub trait JobRepo: Send + Sync {
    /// Insert a new job in `queued` state.
    async fn create(
        &self,
        owner: ResourceId,
        platform: Platform,
        payload: PublishPayload,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> DbResult<PublishingJob>;

    /// Fetch a job by id.
    async fn get(&self, id: ResourceId) -> DbResult<PublishingJob>;

    /// Compare-and-set the job's status. Applies `update` and refreshes
    /// `updated_at` only if the current status is one of `expected`; returns
    /// `None` when the guard fails, leaving the row untouched.
    async fn transition(
        &self,
        id: ResourceId,
        expected: &[JobStatus],
        update: JobUpdate,
    ) -> DbResult<Option<PublishingJob>>;

    /// List an owner's jobs, filtered, ordered by scheduled time descending
    /// with unscheduled jobs last.
    async fn list_by_owner(
        &self,
        owner: ResourceId,
        filter: &JobFilter,
    ) -> DbResult<Vec<PublishingJob>>;

    /// Queued jobs whose scheduled time is absent or has elapsed, oldest
    /// schedule first. Feeds the automatic dispatch worker.
    async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> DbResult<Vec<PublishingJob>>;
}
