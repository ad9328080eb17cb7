//! Authorization URL construction

use crate::error::{Error, Result};
use crate::settings::OAuthSettings;

/// Build the browser redirect URL for the authorization-code flow.
///
/// Scopes are space-joined as WHOOP expects; all parameters are form-encoded.
pub fn build_authorization_url(settings: &OAuthSettings, client_id: &str, state: &str) -> Result<String> {
    let scope = settings.scopes.join(" ");
    let url = reqwest::Url::parse_with_params(
        &settings.authorize_url,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", settings.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("state", state),
        ],
    )
    .map_err(|e| Error::InvalidAuthorizeUrl(format!("{}: {e}", settings.authorize_url)))?;

    Ok(url.into())
}
