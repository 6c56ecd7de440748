//! Error taxonomy for the AI invocation plane.
//!
//! The plane itself never chooses an HTTP status; `status_code` exists so
//! the boundary crate can map a failure to one without duplicating the
//! match arms.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiPlaneError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("all candidate models are currently rate-limited")]
    LocalRateLimited,

    #[error("provider rate limit hit, retry after {retry_after:?}")]
    UpstreamRateLimit { retry_after: Duration },

    #[error("provider call timed out")]
    UpstreamTimeout,

    #[error("provider response could not be coerced into the expected schema: {message}")]
    SchemaInvalid { original: String, cleaned: String, message: String },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AiPlaneError {
    /// HTTP status this error would map to at the boundary. The plane
    /// itself never constructs a response; callers that sit behind an
    /// HTTP framework use this to pick one.
    pub fn status_code(&self) -> u16 {
        match self {
            AiPlaneError::InvalidArgument(_) => 400,
            AiPlaneError::NotFound(_) => 404,
            AiPlaneError::Conflict(_) => 409,
            AiPlaneError::LocalRateLimited => 429,
            AiPlaneError::UpstreamRateLimit { .. } => 429,
            AiPlaneError::UpstreamTimeout => 504,
            AiPlaneError::SchemaInvalid { .. } => 502,
            AiPlaneError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(AiPlaneError::InvalidArgument("x".into()).status_code(), 400);
        assert_eq!(AiPlaneError::NotFound("x".into()).status_code(), 404);
        assert_eq!(AiPlaneError::Conflict("x".into()).status_code(), 409);
        assert_eq!(AiPlaneError::LocalRateLimited.status_code(), 429);
        assert_eq!(
            AiPlaneError::UpstreamRateLimit { retry_after: Duration::from_secs(1) }.status_code(),
            429
        );
        assert_eq!(AiPlaneError::UpstreamTimeout.status_code(), 504);
        assert_eq!(
            AiPlaneError::SchemaInvalid {
                original: "x".into(),
                cleaned: "y".into(),
                message: "z".into(),
            }
            .status_code(),
            502
        );
        assert_eq!(
            AiPlaneError::Internal(anyhow::anyhow!("boom")).status_code(),
            500
        );
    }
}
