//! Error taxonomy for the correlation pipeline.
//!
//! Each phase owns the failure classes it can absorb. Only the variants of
//! [`PipelineError`] ever turn an analysis into a `failed` result.

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single request against an evidence or resolution provider.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The attempt exceeded its time budget.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The provider could not be reached.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The provider answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider answered definitively that nothing matches.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response body could not be interpreted.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The adapter needs a canonical identifier the resolver could not supply.
    #[error("missing canonical identifier: {0}")]
    MissingIdentifier(String),
}

impl FetchError {
    /// Build a status error, mapping 404 to [`FetchError::NotFound`].
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status == 404 {
            FetchError::NotFound(truncate(&body, 200))
        } else {
            FetchError::Status {
                status,
                body: truncate(&body, 200),
            }
        }
    }

    /// Map a transport-level reqwest error.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Connect(format!("timed out: {}", err))
        } else if err.is_connect() || err.is_request() {
            FetchError::Connect(err.to_string())
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::from_status(status.as_u16(), err.to_string())
        } else {
            FetchError::Connect(err.to_string())
        }
    }
}

/// Failure reported by an LLM provider.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// The API key was rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The account has run out of quota or credit.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The provider asked us to slow down.
    #[error("rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<u64>,
    },

    /// The provider is temporarily failing (5xx).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The attempt exceeded its time budget.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Network failure reaching the provider.
    #[error("transport error: {0}")]
    Transport(String),

    /// Any other non-success answer from the provider.
    #[error("provider error {status}: {body}")]
    Api { status: u16, body: String },

    /// The response envelope did not have the provider's documented shape.
    #[error("invalid response envelope: {0}")]
    InvalidResponse(String),

    /// No API key is available for the selected provider.
    #[error("missing API key for {0}")]
    MissingApiKey(String),
}

impl LlmError {
    /// Classify a non-success HTTP answer from an LLM provider.
    pub fn from_status(provider: &str, status: u16, body: &str, retry_after: Option<u64>) -> Self {
        let lowered = body.to_lowercase();
        match status {
            401 | 403 => LlmError::Authentication(format!("Invalid {} API key", provider)),
            429 if lowered.contains("quota") || lowered.contains("billing") => {
                LlmError::QuotaExceeded(format!("{} quota exceeded: {}", provider, truncate(body, 200)))
            }
            429 => LlmError::RateLimited {
                message: format!("{} rate limit exceeded", provider),
                retry_after,
            },
            500..=599 => LlmError::ServiceUnavailable(format!(
                "{} returned {}: {}",
                provider,
                status,
                truncate(body, 200)
            )),
            _ => LlmError::Api {
                status,
                body: truncate(body, 500),
            },
        }
    }

    /// Map a transport-level reqwest error.
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if err.is_connect() {
            LlmError::Transport(format!("cannot connect to {}: {}", provider, err))
        } else {
            LlmError::Transport(format!("{} request failed: {}", provider, err))
        }
    }
}

/// Fatal failures that end an analysis in the `failed` state.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The LLM provider failed at the transport or account level.
    #[error("LLM provider error: {0}")]
    Provider(#[from] LlmError),

    /// The overall analysis deadline elapsed.
    #[error("analysis timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the analysis.
    #[error("analysis cancelled before {0}")]
    Cancelled(String),

    /// Anything the phases did not model.
    #[error("internal pipeline error: {0}")]
    Internal(String),
}

/// Human readable payload of a caught panic.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
