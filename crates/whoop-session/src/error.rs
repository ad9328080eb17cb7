//! Error taxonomy for session operations

/// Errors surfaced to the routing layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid client configuration. Raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The callback's `state` was unknown, expired, or already used.
    #[error("invalid or expired state parameter")]
    Csrf,

    /// The user denied access or the provider reported an error on redirect.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The token endpoint failed or answered with something unusable.
    #[error("token exchange failed: {0}")]
    Exchange(#[source] whoop_auth::Error),

    /// The refresh token was rejected; the stored record has been cleared.
    #[error("re-authorization required: {0}")]
    ReauthorizationRequired(String),

    /// No token is stored; the authorization flow has not been completed.
    #[error("authentication required: no stored token")]
    AuthenticationRequired,

    #[error("token storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Short machine-readable label for logs, metrics, and JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration_error",
            Error::Csrf => "csrf_error",
            Error::Authorization(_) => "authorization_error",
            Error::Exchange(_) => "exchange_error",
            Error::ReauthorizationRequired(_) => "reauthorization_required",
            Error::AuthenticationRequired => "authentication_required",
            Error::Storage(_) => "storage_error",
        }
    }

    /// Whether the caller has to send the user through authorization again.
    pub fn requires_authorization(&self) -> bool {
        matches!(
            self,
            Error::AuthenticationRequired | Error::ReauthorizationRequired(_)
        )
    }
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
