//! WHOOP OAuth constants
//!
//! Provider endpoints and defaults. Client credentials are not constants; they
//! come from configuration and live in `OAuthSettings`.

/// Authorization endpoint the user's browser is redirected to
pub const AUTHORIZE_ENDPOINT: &str = "https://api.prod.whoop.com/oauth/oauth2/auth";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://api.prod.whoop.com/oauth/oauth2/token";

/// Base URL of the WHOOP developer API
pub const API_BASE_URL: &str = "https://api.prod.whoop.com/developer";

/// Callback served by the local OAuth server
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";

/// Scopes requested on authorization.
/// `offline` is what makes WHOOP issue a refresh token.
pub const DEFAULT_SCOPES: &[&str] = &[
    "offline",
    "read:profile",
    "read:body_measurement",
    "read:cycles",
    "read:sleep",
    "read:workout",
];

/// Subtracted from the provider-reported lifetime so a token is refreshed
/// slightly before the provider would reject it
pub const DEFAULT_EXPIRY_MARGIN_SECS: u64 = 60;

/// Upper bound on a single token endpoint round trip
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Lifetime of an issued state nonce
pub const STATE_TTL_SECS: u64 = 600; // 10 minutes

/// Used when the token response omits `token_type`
pub const DEFAULT_TOKEN_TYPE: &str = "bearer";
