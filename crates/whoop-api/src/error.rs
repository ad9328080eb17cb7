//! Errors from WHOOP API calls

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure: connection refused, TLS, or timeout
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// 429 from the API. `reset` carries `X-RateLimit-Reset` when present.
    #[error("rate limited by WHOOP API (reset: {})", reset.as_deref().unwrap_or("unknown"))]
    RateLimited { reset: Option<String> },

    #[error("WHOOP API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid request parameters: {0}")]
    InvalidParams(String),

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl Error {
    /// Upstream HTTP status, if the API answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RateLimited { .. } => Some(429),
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
