//! Publisher backed by the hosted platform gateway.
//!
//! The gateway fronts the per-platform APIs and dedupes on our job id: posting
//! a job that was already delivered returns 409 with the existing post id,
//! which this adapter reports as success so a retried job never creates a
//! duplicate remote artifact.

use async_trait::async_trait;
use crosspost_core::publisher::{PublishOutcome, PublishRequest, Publisher};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Gateway connection settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: Url,
    pub api_token: String,
}

impl GatewayConfig {
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("CROSSPOST_GATEWAY_URL").ok()?.parse().ok()?;
        let api_token = std::env::var("CROSSPOST_GATEWAY_TOKEN").ok()?;
        Some(Self { base_url, api_token })
    }
}

#[derive(Debug, Serialize)]
struct PostBody<'a> {
    job_id: String,
    body: &'a str,
    media: &'a [String],
    metadata: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    /// Present on duplicate responses: the id of the post already created.
    existing_id: Option<String>,
}

/// Publisher that delivers through the platform gateway.
pub struct GatewayPublisher {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl GatewayPublisher {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn post_url(&self, platform: &str) -> String {
        format!(
            "{}/v1/platforms/{platform}/posts",
            self.config.base_url.as_str().trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Publisher for GatewayPublisher {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn publish(&self, request: PublishRequest<'_>) -> PublishOutcome {
        let url = self.post_url(request.platform.as_str());

        let body = PostBody {
            job_id: request.job_id.to_string(),
            body: &request.payload.body,
            media: &request.payload.media,
            metadata: &request.payload.metadata,
        };

        let response = match self
            .client
            .post(url)
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return PublishOutcome::Rejected {
                    reason: format!("gateway unreachable: {e}"),
                };
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!(job_id = %request.job_id, platform = %request.platform, %status, "Gateway response");
        outcome_from_response(status, &text)
    }
}

/// Map a gateway response to a publish outcome. Pure so it can be tested
/// without a network.
fn outcome_from_response(status: StatusCode, body: &str) -> PublishOutcome {
    if status.is_success() {
        return match serde_json::from_str::<PostResponse>(body) {
            Ok(post) => PublishOutcome::Accepted {
                external_id: post.id,
            },
            Err(e) => PublishOutcome::Rejected {
                reason: format!("gateway returned unreadable response: {e}"),
            },
        };
    }

    // Duplicate delivery: the artifact already exists remotely.
    if status == StatusCode::CONFLICT {
        if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
            if let Some(existing_id) = err.existing_id {
                return PublishOutcome::Accepted {
                    external_id: existing_id,
                };
            }
        }
    }

    let reason = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error)
        .unwrap_or_else(|| format!("gateway returned {status}"));
    PublishOutcome::Rejected { reason }
}
