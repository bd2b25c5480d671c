//! Platform publisher trait and outcome types.
//!
//! Publishers perform the actual network call that pushes content to a
//! distribution platform. The queue engine records whatever a publisher
//! reports; it never raises delivery failures as exceptions.

use async_trait::async_trait;

use crate::job::{Platform, PublishPayload};
use crate::ResourceId;

/// One delivery attempt handed to a publisher.
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    /// Queue-side job id, passed through so the platform side can dedupe.
    pub job_id: ResourceId,
    pub platform: Platform,
    pub payload: &'a PublishPayload,
}

/// Result of a delivery attempt.
///
/// Implementations must be idempotent-safe from the engine's perspective: a
/// second call for an already-delivered item must not create a duplicate
/// remote artifact, and should report `Accepted` with the existing id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The platform accepted the content and assigned it an identifier.
    Accepted { external_id: String },
    /// The platform (or the transport to it) rejected the attempt.
    Rejected { reason: String },
}

/// Trait for platform publishers.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Name of this publisher, for diagnostics.
    fn name(&self) -> &'static str;

    /// Deliver the payload to the platform. Transport errors are reported as
    /// `Rejected`, not returned as errors; rate limiting against the platform
    /// is the publisher's responsibility.
    async fn publish(&self, request: PublishRequest<'_>) -> PublishOutcome;
}
