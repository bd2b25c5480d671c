//! In-memory implementation of the job repository.
//!
//! Backs engine tests and local development without a database. Mutation goes
//! through the same compare-and-set contract as the PostgreSQL
//! implementation; the map mutex makes each transition atomic.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crosspost_core::job::listing_order;
use crosspost_core::{JobFilter, JobStatus, Platform, PublishPayload, PublishingJob, ResourceId};

use crate::repo::job::{JobRepo, JobUpdate};
use crate::{DbError, DbResult};

/// In-memory [`JobRepo`].
#[derive(Default)]
pub struct MemoryJobRepo {
    jobs: Mutex<HashMap<ResourceId, PublishingJob>>,
}

impl MemoryJobRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepo for MemoryJobRepo {
    async fn create(
        &self,
        owner: ResourceId,
        platform: Platform,
        payload: PublishPayload,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> DbResult<PublishingJob> {
        let now = Utc::now();
        let job = PublishingJob {
            id: ResourceId::new(),
            owner,
            platform,
            payload,
            scheduled_time,
            status: JobStatus::Queued,
            error_log: None,
            external_id: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs
            .lock()
            .expect("job map poisoned")
            .insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: ResourceId) -> DbResult<PublishingJob> {
        self.jobs
            .lock()
            .expect("job map poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("job {}", id)))
    }

    async fn transition(
        &self,
        id: ResourceId,
        expected: &[JobStatus],
        update: JobUpdate,
    ) -> DbResult<Option<PublishingJob>> {
        let mut jobs = self.jobs.lock().expect("job map poisoned");
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("job {}", id)))?;
        if !expected.contains(&job.status) {
            return Ok(None);
        }
        job.status = update.status;
        job.error_log = update.error_log;
        if let Some(external_id) = update.external_id {
            job.external_id = Some(external_id);
        }
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn list_by_owner(
        &self,
        owner: ResourceId,
        filter: &JobFilter,
    ) -> DbResult<Vec<PublishingJob>> {
        let jobs = self.jobs.lock().expect("job map poisoned");
        let mut matched: Vec<PublishingJob> = jobs
            .values()
            .filter(|j| j.owner == owner && filter.matches(j))
            .cloned()
            .collect();
        matched.sort_by(listing_order);
        Ok(matched)
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> DbResult<Vec<PublishingJob>> {
        let jobs = self.jobs.lock().expect("job map poisoned");
        let mut due: Vec<PublishingJob> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued && j.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|j| (j.scheduled_time, j.created_at));
        due.truncate(limit as usize);
        Ok(due)
    }
}
