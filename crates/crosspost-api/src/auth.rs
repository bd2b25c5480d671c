//! Owner-context extraction.
//!
//! The fronting auth layer authenticates the session and injects the account
//! id as a header; every command route requires it. A request without a
//! usable account header is rejected before any handler state is touched.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use crosspost_core::{OwnerContext, ResourceId};

use crate::error::ApiError;

/// Header carrying the authenticated account id.
pub const ACCOUNT_HEADER: &str = "x-account-id";

/// Extractor wrapping the authenticated [`OwnerContext`].
#[derive(Debug, Clone, Copy)]
pub struct Owner(pub OwnerContext);

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(ACCOUNT_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing account context".to_string()))?;
        let account: ResourceId = header
            .to_str()
            .ok()
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| ApiError::Unauthorized("malformed account context".to_string()))?;
        Ok(Owner(OwnerContext::new(account)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Owner, ApiError> {
        let (mut parts, _) = request.into_parts();
        Owner::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let request = Request::builder().uri("/api/v1/jobs").body(()).unwrap();
        assert!(matches!(
            extract(request).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_header_is_unauthorized() {
        let request = Request::builder()
            .uri("/api/v1/jobs")
            .header(ACCOUNT_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        assert!(matches!(
            extract(request).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_valid_header_yields_context() {
        let account = ResourceId::new();
        let request = Request::builder()
            .uri("/api/v1/jobs")
            .header(ACCOUNT_HEADER, account.to_string())
            .body(())
            .unwrap();
        let Owner(ctx) = extract(request).await.unwrap();
        assert_eq!(ctx.account, account);
    }
}
