//! Publishing job entity and status state machine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ResourceId;

/// A unit of scheduled content delivery to an external platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingJob {
    /// Unique identifier, assigned at creation, immutable.
    pub id: ResourceId,
    /// Account the job belongs to; all operator access is scoped to it.
    pub owner: ResourceId,
    /// Distribution target.
    pub platform: Platform,
    /// Content bundle handed verbatim to the platform publisher.
    pub payload: PublishPayload,
    /// If present, the job must not be auto-dispatched before this instant.
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Delivery diagnostic; non-empty exactly when `status` is `Failed`.
    pub error_log: Option<String>,
    /// Platform-assigned identifier recorded on successful publish.
    pub external_id: Option<String>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every status transition.
    pub updated_at: DateTime<Utc>,
}

impl PublishingJob {
    /// Whether automatic dispatch may pick this job up at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.scheduled_time {
            Some(at) => at <= now,
            None => true,
        }
    }
}

/// Lifecycle state of a publishing job.
///
/// `Queued` is the initial state. `Published` and `Cancelled` are terminal.
/// `Failed` is terminal for the automatic flow only; operators may still
/// retry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for its scheduled time or an operator action.
    Queued,
    /// A dispatch has claimed the job and the publisher call is in flight.
    Processing,
    /// The platform accepted the content.
    Published,
    /// The platform rejected the content; see `error_log`.
    Failed,
    /// Withdrawn by an operator.
    Cancelled,
}

impl JobStatus {
    /// States from which a dispatch may claim the job.
    pub const DISPATCHABLE: [JobStatus; 2] = [JobStatus::Queued, JobStatus::Failed];
    /// States an operator cancel may leave.
    pub const CANCELLABLE: [JobStatus; 3] =
        [JobStatus::Queued, JobStatus::Failed, JobStatus::Processing];

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Published | JobStatus::Cancelled)
    }

    /// Whether an operator retry is permitted from this state.
    pub fn is_retryable(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Published => "published",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "published" => Ok(JobStatus::Published),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// An external distribution target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Facebook,
    Twitter,
    Linkedin,
    Tiktok,
    Youtube,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
            Platform::Tiktok => "tiktok",
            Platform::Youtube => "youtube",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "instagram" => Ok(Platform::Instagram),
            "facebook" => Ok(Platform::Facebook),
            "twitter" => Ok(Platform::Twitter),
            "linkedin" => Ok(Platform::Linkedin),
            "tiktok" => Ok(Platform::Tiktok),
            "youtube" => Ok(Platform::Youtube),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

/// Content bundle for one delivery. Opaque to the queue engine; only the
/// platform publisher interprets it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishPayload {
    /// Post body text.
    pub body: String,
    /// References to already-uploaded media assets.
    #[serde(default)]
    pub media: Vec<String>,
    /// Free-form platform metadata (link cards, alt text, audience, ...).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Filters for the operator-facing job listing. All fields compose; ordering
/// of results is unaffected by which filters are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilter {
    /// Exact status match; `None` means all statuses.
    pub status: Option<JobStatus>,
    /// Exact platform match; `None` means all platforms.
    pub platform: Option<Platform>,
    /// Inclusive lower bound on the scheduled day.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the scheduled day (through end of day).
    pub date_to: Option<NaiveDate>,
}

impl JobFilter {
    /// Whether a job passes this filter. Jobs without a scheduled time are
    /// excluded once either date bound is set.
    pub fn matches(&self, job: &PublishingJob) -> bool {
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        if let Some(platform) = self.platform {
            if job.platform != platform {
                return false;
            }
        }
        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(day) = job.scheduled_time.map(|t| t.date_naive()) else {
                return false;
            };
            if self.date_from.is_some_and(|from| day < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| day > to) {
                return false;
            }
        }
        true
    }
}

/// Ordering contract for job listings: scheduled time descending, jobs with
/// no schedule after those with one, newest-created first as tiebreak.
pub fn listing_order(a: &PublishingJob, b: &PublishingJob) -> std::cmp::Ordering {
    match (a.scheduled_time, b.scheduled_time) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
    .then_with(|| b.created_at.cmp(&a.created_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn job_at(scheduled: Option<&str>) -> PublishingJob {
        PublishingJob {
            id: ResourceId::new(),
            owner: ResourceId::new(),
            platform: Platform::Instagram,
            payload: PublishPayload::default(),
            scheduled_time: scheduled.map(|s| s.parse().unwrap()),
            status: JobStatus::Queued,
            error_log: None,
            external_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Published.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_retryable_states() {
        assert!(JobStatus::Queued.is_retryable());
        assert!(JobStatus::Failed.is_retryable());
        assert!(JobStatus::Processing.is_retryable());
        assert!(!JobStatus::Published.is_retryable());
        assert!(!JobStatus::Cancelled.is_retryable());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Published,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("pending".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_is_due() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert!(job_at(None).is_due(now));
        assert!(job_at(Some("2025-06-01T11:00:00Z")).is_due(now));
        assert!(job_at(Some("2025-06-01T12:00:00Z")).is_due(now));
        assert!(!job_at(Some("2025-06-01T13:00:00Z")).is_due(now));
    }

    #[test]
    fn test_filter_date_range_is_inclusive() {
        let filter = JobFilter {
            date_from: Some("2025-06-01".parse().unwrap()),
            date_to: Some("2025-06-02".parse().unwrap()),
            ..Default::default()
        };
        // Late on the last day of the range still matches.
        assert!(filter.matches(&job_at(Some("2025-06-02T23:30:00Z"))));
        assert!(filter.matches(&job_at(Some("2025-06-01T00:00:00Z"))));
        assert!(!filter.matches(&job_at(Some("2025-06-03T00:00:00Z"))));
        // Unscheduled jobs fall outside any date-bounded view.
        assert!(!filter.matches(&job_at(None)));
    }

    #[test]
    fn test_listing_order_puts_unscheduled_last() {
        let mut jobs = vec![
            job_at(None),
            job_at(Some("2025-06-01T10:00:00Z")),
            job_at(Some("2025-06-03T10:00:00Z")),
        ];
        jobs.sort_by(listing_order);
        assert_eq!(
            jobs[0].scheduled_time.unwrap().to_rfc3339(),
            "2025-06-03T10:00:00+00:00"
        );
        assert!(jobs[2].scheduled_time.is_none());
    }
}
