//! Error taxonomy for a single pipeline run.
//!
//! Best-effort JSON extraction has no error type: it always falls back to a
//! default value and never reaches this module.

use std::time::Duration;
use thiserror::Error;

/// Failure of the outbound HTTP call (or of the token endpoint call).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// HTTP status code, when the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short machine-readable classification, recorded as `error.type`.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Network(_) => "network",
            TransportError::Status { .. } => "http_status",
            TransportError::Timeout(_) => "timeout",
        }
    }
}

/// Everything that can abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid required configuration. Raised before any span is opened.
    #[error("configuration error: {0}")]
    Config(String),

    /// The request body could not be resolved. Raised before any span is opened.
    #[error("could not resolve request body from {source_desc}: {reason}")]
    BodyResolution { source_desc: String, reason: String },

    /// Credentials were supplied but the token exchange failed.
    #[error("token exchange failed: {0}")]
    AuthFailure(String),

    /// The traced HTTP call failed; the span has already been closed as ERROR.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
