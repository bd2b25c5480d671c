//! Worker that dispatches scheduled jobs once they come due.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crosspost_core::Error;
use crosspost_db::JobRepo;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::engine::{DispatchMode, QueueEngine};

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Polls the store for due queued jobs and pushes them through the same
/// dispatch path operators use. Safe to run alongside operator commands and
/// other worker instances: the claim into `processing` admits one winner per
/// job.
pub struct QueueWorker {
    repo: Arc<dyn JobRepo>,
    engine: Arc<QueueEngine>,
    poll_interval: Duration,
    batch_size: i64,
}

impl QueueWorker {
    pub fn new(repo: Arc<dyn JobRepo>, engine: Arc<QueueEngine>) -> Self {
        Self {
            repo,
            engine,
            poll_interval: Duration::from_secs(5),
            batch_size: 20,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run the worker loop.
    pub async fn run(&self) {
        info!(interval = ?self.poll_interval, "Starting dispatch worker");

        loop {
            match self.tick(Utc::now()).await {
                Ok(0) => sleep(self.poll_interval).await,
                Ok(dispatched) => {
                    debug!(dispatched, "Dispatched due jobs");
                }
                Err(e) => {
                    warn!(error = %e, "Failed to scan for due jobs");
                    sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Dispatch every job due at `now`, concurrently, and return how many
    /// were picked up. Jobs lost to a concurrent operator action are skipped
    /// quietly.
    pub async fn tick(&self, now: DateTime<Utc>) -> crosspost_core::Result<usize> {
        let due = self.repo.list_due(now, self.batch_size).await?;
        if due.is_empty() {
            return Ok(0);
        }

        let dispatched = due.len();
        let dispatches = due.into_iter().map(|job| {
            let engine = self.engine.clone();
            async move {
                let job_id = job.id;
                match engine.dispatch(job, DispatchMode::Scheduled).await {
                    Ok(done) => {
                        info!(job_id = %job_id, status = %done.status, "Dispatched scheduled job");
                    }
                    Err(Error::InvalidTransition { .. }) | Err(Error::NotDue(_)) => {
                        debug!(job_id = %job_id, "Job no longer eligible for dispatch");
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, error = %e, "Dispatch failed");
                    }
                }
            }
        });
        futures::future::join_all(dispatches).await;
        Ok(dispatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use crosspost_core::{
        JobStatus, OwnerContext, Platform, PublishOutcome, PublishPayload, PublishRequest,
        Publisher, ResourceId,
    };
    use crosspost_db::MemoryJobRepo;

    struct AcceptAll;

    #[async_trait]
    impl Publisher for AcceptAll {
        fn name(&self) -> &'static str {
            "accept-all"
        }

        async fn publish(&self, request: PublishRequest<'_>) -> PublishOutcome {
            PublishOutcome::Accepted {
                external_id: format!("ext-{}", request.job_id),
            }
        }
    }

    #[tokio::test]
    async fn test_tick_dispatches_only_due_jobs() {
        let repo = Arc::new(MemoryJobRepo::new());
        let engine = Arc::new(QueueEngine::new(repo.clone(), Arc::new(AcceptAll)));
        let worker = QueueWorker::new(repo.clone(), engine.clone());
        let ctx = OwnerContext::new(ResourceId::new());

        let payload = PublishPayload {
            body: "post".to_string(),
            media: vec![],
            metadata: serde_json::Value::Null,
        };
        let now = Utc::now();
        let due = engine
            .enqueue(&ctx, Platform::Instagram, payload.clone(), Some(now - ChronoDuration::minutes(1)))
            .await
            .unwrap();
        let future = engine
            .enqueue(&ctx, Platform::Instagram, payload, Some(now + ChronoDuration::hours(1)))
            .await
            .unwrap();

        let dispatched = worker.tick(now).await.unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(repo.get(due.id).await.unwrap().status, JobStatus::Published);
        assert_eq!(repo.get(future.id).await.unwrap().status, JobStatus::Queued);

        // Nothing left to pick up.
        assert_eq!(worker.tick(now).await.unwrap(), 0);
    }
}
