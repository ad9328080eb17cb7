//! Error types for OAuth token operations

/// Errors from the token endpoint, state tracking, and token storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure: connection refused, TLS, or timeout
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint returned {status}: {body}")]
    TokenExchange { status: u16, body: String },

    #[error("malformed token response ({reason}): {body}")]
    MalformedResponse {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("client credentials not configured (set WHOOP_CLIENT_ID and WHOOP_CLIENT_SECRET)")]
    MissingCredentials,

    #[error("invalid authorization URL: {0}")]
    InvalidAuthorizeUrl(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the provider answered and refused the grant.
    ///
    /// Transport failures are not rejections: the grant may still be valid
    /// and the whole operation can be retried.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::TokenExchange { .. } | Error::MalformedResponse { .. }
        )
    }

    /// HTTP status reported by the token endpoint, if it answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::TokenExchange { status, .. } | Error::MalformedResponse { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
