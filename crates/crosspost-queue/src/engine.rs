//! Queue engine: guarded state transitions and operator commands.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use crosspost_core::{
    Error, JobFilter, JobStatus, OwnerContext, Platform, PublishOutcome, PublishPayload,
    PublishRequest, Publisher, PublishingJob, ResourceId, Result,
};
use crosspost_db::{JobRepo, JobUpdate};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Whether a dispatch honors the job's scheduled time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Automatic path: a queued job must be due.
    Scheduled,
    /// Operator override: ignore the schedule.
    Forced,
}

/// Aggregate result of a bulk retry. Partial success is expected; per-job
/// failures are recorded on the jobs themselves.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BulkRetryReport {
    /// Jobs that came out published.
    pub retried: usize,
}

/// The publishing queue engine.
///
/// Every status mutation goes through [`QueueEngine::dispatch`] or an
/// operator command here; nothing else writes `status` or `error_log`. The
/// transition into `processing` is a compare-and-set, so the same job id is
/// never dispatched twice concurrently.
pub struct QueueEngine {
    repo: Arc<dyn JobRepo>,
    publisher: Arc<dyn Publisher>,
}

impl QueueEngine {
    pub fn new(repo: Arc<dyn JobRepo>, publisher: Arc<dyn Publisher>) -> Self {
        Self { repo, publisher }
    }

    /// Create a job in `queued` state.
    pub async fn enqueue(
        &self,
        ctx: &OwnerContext,
        platform: Platform,
        payload: PublishPayload,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> Result<PublishingJob> {
        if payload.body.is_empty() && payload.media.is_empty() {
            return Err(Error::InvalidInput("payload has no content".to_string()));
        }
        let job = self
            .repo
            .create(ctx.account, platform, payload, scheduled_time)
            .await?;
        info!(job_id = %job.id, platform = %job.platform, "Enqueued publishing job");
        Ok(job)
    }

    /// Filtered, time-ordered view of the caller's jobs.
    pub async fn list_jobs(
        &self,
        ctx: &OwnerContext,
        filter: &JobFilter,
    ) -> Result<Vec<PublishingJob>> {
        Ok(self.repo.list_by_owner(ctx.account, filter).await?)
    }

    /// Re-dispatch a job that is not yet published or cancelled.
    ///
    /// Safe to call repeatedly: once a retry lands the job in `published`,
    /// further retries are rejected before any publisher call, and the
    /// publisher itself reports an already-delivered item as success with the
    /// existing external id.
    pub async fn retry_job(&self, ctx: &OwnerContext, id: ResourceId) -> Result<PublishingJob> {
        let job = self.load_owned(ctx, id).await?;
        if !job.status.is_retryable() {
            return Err(Error::InvalidTransition {
                from: job.status,
                action: "retry",
            });
        }
        self.dispatch(job, DispatchMode::Scheduled).await
    }

    /// Retry each job independently; one job's failure never aborts the rest.
    pub async fn bulk_retry(
        &self,
        ctx: &OwnerContext,
        ids: &[ResourceId],
    ) -> Result<BulkRetryReport> {
        let mut retried = 0;
        for &id in ids {
            match self.retry_job(ctx, id).await {
                Ok(job) if job.status == JobStatus::Published => retried += 1,
                Ok(job) => {
                    debug!(job_id = %job.id, status = %job.status, "Bulk retry attempt did not publish");
                }
                Err(e) => {
                    debug!(job_id = %id, error = %e, "Bulk retry skipped job");
                }
            }
        }
        Ok(BulkRetryReport { retried })
    }

    /// Dispatch a `queued` job now, ignoring its scheduled time.
    pub async fn manual_publish(&self, ctx: &OwnerContext, id: ResourceId) -> Result<PublishingJob> {
        let job = self.load_owned(ctx, id).await?;
        if job.status != JobStatus::Queued {
            return Err(Error::InvalidTransition {
                from: job.status,
                action: "manually publish",
            });
        }
        self.dispatch(job, DispatchMode::Forced).await
    }

    /// Withdraw a job. A cancel that races an in-flight dispatch only sticks
    /// if it lands before the dispatch claims the job; otherwise the
    /// dispatch's recorded outcome takes precedence.
    pub async fn cancel_job(&self, ctx: &OwnerContext, id: ResourceId) -> Result<PublishingJob> {
        let job = self.load_owned(ctx, id).await?;
        match self
            .repo
            .transition(id, &JobStatus::CANCELLABLE, JobUpdate::cancelled())
            .await?
        {
            Some(cancelled) => {
                info!(job_id = %id, "Cancelled publishing job");
                Ok(cancelled)
            }
            None => Err(Error::InvalidTransition {
                from: job.status,
                action: "cancel",
            }),
        }
    }

    /// Move a job through `processing` and record the delivery outcome.
    ///
    /// The claim is persisted before the publisher is invoked, so observers
    /// never see a job making an external call while still shown as queued,
    /// and a concurrent dispatch of the same id loses the compare-and-set.
    /// No lock is held across the publisher call.
    pub async fn dispatch(&self, job: PublishingJob, mode: DispatchMode) -> Result<PublishingJob> {
        if mode == DispatchMode::Scheduled && job.status == JobStatus::Queued {
            if let Some(at) = job.scheduled_time {
                if at > Utc::now() {
                    return Err(Error::NotDue(at));
                }
            }
        }

        let claimed = self
            .repo
            .transition(job.id, &JobStatus::DISPATCHABLE, JobUpdate::processing())
            .await?;
        let Some(job) = claimed else {
            let current = self.repo.get(job.id).await?;
            return Err(Error::InvalidTransition {
                from: current.status,
                action: "dispatch",
            });
        };

        let outcome = self
            .publisher
            .publish(PublishRequest {
                job_id: job.id,
                platform: job.platform,
                payload: &job.payload,
            })
            .await;

        let update = match outcome {
            PublishOutcome::Accepted { external_id } => {
                info!(job_id = %job.id, platform = %job.platform, %external_id, "Job published");
                JobUpdate::published(external_id)
            }
            PublishOutcome::Rejected { reason } => {
                warn!(job_id = %job.id, platform = %job.platform, %reason, "Publish rejected");
                // A failed job always carries a diagnostic, even when the
                // publisher had nothing to say.
                let reason = if reason.is_empty() {
                    "publisher rejected the job without detail".to_string()
                } else {
                    reason
                };
                JobUpdate::failed(reason)
            }
        };

        // The terminal write also admits `cancelled`: a cancel that arrived
        // after the claim must not suppress the recorded outcome.
        let done = self
            .repo
            .transition(
                job.id,
                &[JobStatus::Processing, JobStatus::Cancelled],
                update,
            )
            .await?;
        done.ok_or_else(|| Error::Internal(format!("job {} left processing unexpectedly", job.id)))
    }

    /// Fetch a job and check ownership. Foreign jobs surface as not-found so
    /// ids are not probeable across accounts.
    async fn load_owned(&self, ctx: &OwnerContext, id: ResourceId) -> Result<PublishingJob> {
        let job = self.repo.get(id).await?;
        if !ctx.owns(job.owner) {
            return Err(Error::NotFound(format!("job {}", id)));
        }
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use crosspost_db::MemoryJobRepo;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    /// Publisher scripted per job id: rejects listed jobs, accepts the rest.
    /// Records every call; optionally parks calls on a semaphore so tests can
    /// interleave operator actions with an in-flight dispatch.
    #[derive(Default)]
    struct MockPublisher {
        rejections: Mutex<HashMap<ResourceId, String>>,
        calls: Mutex<Vec<ResourceId>>,
        hold: Option<Arc<Semaphore>>,
    }

    impl MockPublisher {
        fn held() -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            let publisher = Self {
                hold: Some(gate.clone()),
                ..Self::default()
            };
            (publisher, gate)
        }

        fn reject(&self, job_id: ResourceId, reason: &str) {
            self.rejections
                .lock()
                .unwrap()
                .insert(job_id, reason.to_string());
        }

        fn accept(&self, job_id: ResourceId) {
            self.rejections.lock().unwrap().remove(&job_id);
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Publisher for MockPublisher {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn publish(&self, request: PublishRequest<'_>) -> PublishOutcome {
            self.calls.lock().unwrap().push(request.job_id);
            if let Some(gate) = &self.hold {
                gate.acquire().await.unwrap().forget();
            }
            match self.rejections.lock().unwrap().get(&request.job_id) {
                Some(reason) => PublishOutcome::Rejected {
                    reason: reason.clone(),
                },
                None => PublishOutcome::Accepted {
                    external_id: format!("ext-{}", request.job_id),
                },
            }
        }
    }

    struct Harness {
        engine: Arc<QueueEngine>,
        repo: Arc<MemoryJobRepo>,
        publisher: Arc<MockPublisher>,
        ctx: OwnerContext,
    }

    fn harness_with(publisher: MockPublisher) -> Harness {
        let repo = Arc::new(MemoryJobRepo::new());
        let publisher = Arc::new(publisher);
        let engine = Arc::new(QueueEngine::new(repo.clone(), publisher.clone()));
        Harness {
            engine,
            repo,
            publisher,
            ctx: OwnerContext::new(ResourceId::new()),
        }
    }

    fn harness() -> Harness {
        harness_with(MockPublisher::default())
    }

    fn payload() -> PublishPayload {
        PublishPayload {
            body: "spring campaign".to_string(),
            media: vec!["asset://banner.png".to_string()],
            metadata: serde_json::Value::Null,
        }
    }

    /// `error_log` must be set exactly when the job is failed.
    fn assert_diagnostic_invariant(job: &PublishingJob) {
        assert_eq!(
            job.status == JobStatus::Failed,
            job.error_log.as_deref().is_some_and(|e| !e.is_empty()),
            "error_log/status mismatch for {:?}",
            job
        );
    }

    async fn enqueue(h: &Harness, scheduled: Option<DateTime<Utc>>) -> PublishingJob {
        h.engine
            .enqueue(&h.ctx, Platform::Instagram, payload(), scheduled)
            .await
            .unwrap()
    }

    /// Drive a job into `failed` through the normal dispatch path.
    async fn enqueue_failed(h: &Harness) -> PublishingJob {
        let job = enqueue(h, None).await;
        h.publisher.reject(job.id, "platform timeout");
        let failed = h
            .engine
            .dispatch(job, DispatchMode::Scheduled)
            .await
            .unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_diagnostic_invariant(&failed);
        failed
    }

    #[tokio::test]
    async fn test_dispatch_publishes_queued_job() {
        let h = harness();
        let job = enqueue(&h, None).await;

        let done = h
            .engine
            .dispatch(job.clone(), DispatchMode::Scheduled)
            .await
            .unwrap();

        assert_eq!(done.status, JobStatus::Published);
        assert_eq!(done.external_id.as_deref(), Some(format!("ext-{}", job.id).as_str()));
        assert_diagnostic_invariant(&done);
    }

    #[tokio::test]
    async fn test_dispatch_records_rejection_as_failure() {
        let h = harness();
        let failed = enqueue_failed(&h).await;
        assert_eq!(failed.error_log.as_deref(), Some("platform timeout"));
        assert!(failed.external_id.is_none());
    }

    #[tokio::test]
    async fn test_retry_clears_diagnostic_and_republishes() {
        let h = harness();
        let failed = enqueue_failed(&h).await;

        h.publisher.accept(failed.id);
        let done = h.engine.retry_job(&h.ctx, failed.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Published);
        assert_eq!(done.error_log, None);
        assert_diagnostic_invariant(&done);
    }

    #[tokio::test]
    async fn test_retry_terminal_job_is_rejected_unchanged() {
        let h = harness();

        let published = enqueue(&h, None).await;
        let published = h
            .engine
            .dispatch(published, DispatchMode::Scheduled)
            .await
            .unwrap();
        let cancelled = enqueue(&h, None).await;
        let cancelled = h.engine.cancel_job(&h.ctx, cancelled.id).await.unwrap();

        for job in [published, cancelled] {
            let before = h.repo.get(job.id).await.unwrap();
            let err = h.engine.retry_job(&h.ctx, job.id).await.unwrap_err();
            assert!(matches!(
                err,
                Error::InvalidTransition { action: "retry", .. }
            ));
            let after = h.repo.get(job.id).await.unwrap();
            assert_eq!(after.status, before.status);
            assert_eq!(after.updated_at, before.updated_at);
        }
    }

    #[tokio::test]
    async fn test_retry_is_scoped_to_owner() {
        let h = harness();
        let job = enqueue(&h, None).await;

        let stranger = OwnerContext::new(ResourceId::new());
        let err = h.engine.retry_job(&stranger, job.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = h.engine.retry_job(&h.ctx, ResourceId::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_scheduled_dispatch_respects_future_schedule() {
        let h = harness();
        let job = enqueue(&h, Some(Utc::now() + Duration::hours(2))).await;

        let err = h
            .engine
            .dispatch(job.clone(), DispatchMode::Scheduled)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotDue(_)));
        assert_eq!(h.repo.get(job.id).await.unwrap().status, JobStatus::Queued);
        assert_eq!(h.publisher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_manual_publish_bypasses_schedule() {
        let h = harness();
        let job = enqueue(&h, Some(Utc::now() + Duration::hours(2))).await;

        let done = h.engine.manual_publish(&h.ctx, job.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Published);
        // The schedule itself was never advanced, only bypassed.
        assert_eq!(done.scheduled_time, job.scheduled_time);
    }

    #[tokio::test]
    async fn test_manual_publish_requires_queued() {
        let h = harness();
        let failed = enqueue_failed(&h).await;

        let err = h.engine.manual_publish(&h.ctx, failed.id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: JobStatus::Failed,
                action: "manually publish",
            }
        ));
    }

    #[tokio::test]
    async fn test_bulk_retry_reports_partial_success() {
        let h = harness();

        let a = enqueue_failed(&h).await;
        h.publisher.accept(a.id);
        let b = enqueue_failed(&h).await;
        let c = enqueue(&h, None).await;
        let c = h.engine.dispatch(c, DispatchMode::Scheduled).await.unwrap();
        let missing = ResourceId::new();

        let report = h
            .engine
            .bulk_retry(&h.ctx, &[a.id, b.id, c.id, missing])
            .await
            .unwrap();

        assert_eq!(report.retried, 1);
        assert_eq!(h.repo.get(a.id).await.unwrap().status, JobStatus::Published);
        let b_after = h.repo.get(b.id).await.unwrap();
        assert_eq!(b_after.status, JobStatus::Failed);
        assert_diagnostic_invariant(&b_after);
        // The already-published job was not touched.
        assert_eq!(h.repo.get(c.id).await.unwrap().updated_at, c.updated_at);
    }

    #[tokio::test]
    async fn test_concurrent_retries_admit_one_winner() {
        let h = harness();
        let job = enqueue_failed(&h).await;
        h.publisher.accept(job.id);

        let first = {
            let engine = h.engine.clone();
            let ctx = h.ctx;
            let id = job.id;
            tokio::spawn(async move { engine.retry_job(&ctx, id).await })
        };
        let second = {
            let engine = h.engine.clone();
            let ctx = h.ctx;
            let id = job.id;
            tokio::spawn(async move { engine.retry_job(&ctx, id).await })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        for result in &results {
            if let Err(e) = result {
                assert!(matches!(e, Error::InvalidTransition { .. }));
            }
        }
        // One call drove the job into failed, one for the winning retry; the
        // loser never reached the publisher.
        assert_eq!(h.publisher.call_count(), 2);
        assert_eq!(h.repo.get(job.id).await.unwrap().status, JobStatus::Published);
    }

    #[tokio::test]
    async fn test_retry_after_publish_does_not_duplicate() {
        let h = harness();
        let job = enqueue(&h, None).await;

        let done = h.engine.retry_job(&h.ctx, job.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Published);

        let err = h.engine.retry_job(&h.ctx, job.id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(h.publisher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_dispatch_wins() {
        let h = harness();
        let job = enqueue(&h, None).await;

        let cancelled = h.engine.cancel_job(&h.ctx, job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        let err = h
            .engine
            .dispatch(cancelled, DispatchMode::Forced)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: JobStatus::Cancelled,
                action: "dispatch",
            }
        ));
        assert_eq!(h.publisher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_inflight_outcome_survives_cancel() {
        let (publisher, gate) = MockPublisher::held();
        let h = harness_with(publisher);
        let job = enqueue(&h, None).await;

        let dispatch = {
            let engine = h.engine.clone();
            let ctx = h.ctx;
            let id = job.id;
            tokio::spawn(async move { engine.retry_job(&ctx, id).await })
        };

        // Wait for the dispatch to claim the job and park in the publisher.
        while h.publisher.call_count() == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        assert_eq!(
            h.repo.get(job.id).await.unwrap().status,
            JobStatus::Processing
        );

        let cancelled = h.engine.cancel_job(&h.ctx, job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        // Release the publisher; its recorded outcome overrides the cancel.
        gate.add_permits(1);
        let done = dispatch.await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Published);
        assert_eq!(
            h.repo.get(job.id).await.unwrap().status,
            JobStatus::Published
        );
    }

    #[tokio::test]
    async fn test_enqueue_rejects_empty_payload() {
        let h = harness();
        let err = h
            .engine
            .enqueue(&h.ctx, Platform::Instagram, PublishPayload::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_list_jobs_is_scoped_and_ordered() {
        let h = harness();
        let early = enqueue(&h, Some("2025-06-01T10:00:00Z".parse().unwrap())).await;
        let late = enqueue(&h, Some("2025-06-04T10:00:00Z".parse().unwrap())).await;
        let unscheduled = enqueue(&h, None).await;

        let stranger = OwnerContext::new(ResourceId::new());
        h.engine
            .enqueue(&stranger, Platform::Facebook, payload(), None)
            .await
            .unwrap();

        let jobs = h
            .engine
            .list_jobs(&h.ctx, &JobFilter::default())
            .await
            .unwrap();
        let ids: Vec<ResourceId> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![late.id, early.id, unscheduled.id]);
    }

    #[tokio::test]
    async fn test_list_jobs_filters_by_status_and_platform() {
        let h = harness();
        let failed = enqueue_failed(&h).await;
        enqueue(&h, None).await;
        h.engine
            .enqueue(&h.ctx, Platform::Facebook, payload(), None)
            .await
            .unwrap();

        let filter = JobFilter {
            status: Some(JobStatus::Failed),
            platform: Some(Platform::Instagram),
            ..Default::default()
        };
        let jobs = h.engine.list_jobs(&h.ctx, &filter).await.unwrap();
        let ids: Vec<ResourceId> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![failed.id]);
    }
}
