//! OAuth client settings
//!
//! Built by the service's config loader and shared (via `Arc`) between the
//! exchanger and the session. Credentials are optional here: a server without
//! them still starts, and every operation that needs them fails with
//! `Error::MissingCredentials` before touching the network.

use std::collections::BTreeSet;
use std::time::Duration;

use common::Secret;

use crate::constants::{
    AUTHORIZE_ENDPOINT, DEFAULT_EXPIRY_MARGIN_SECS, DEFAULT_REDIRECT_URI, DEFAULT_SCOPES,
    DEFAULT_TIMEOUT_SECS, STATE_TTL_SECS, TOKEN_ENDPOINT,
};
use crate::error::{Error, Result};

/// Registered WHOOP application credentials.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Secret<String>,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Secret::new(client_secret.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub credentials: Option<ClientCredentials>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorize_url: String,
    pub token_url: String,
    /// Subtracted from `expires_in` when computing `TokenRecord::expires_at`
    pub expiry_margin: Duration,
    /// Bound on each token endpoint request
    pub timeout: Duration,
    /// How long an issued state nonce stays redeemable
    pub state_ttl: Duration,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            credentials: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            authorize_url: AUTHORIZE_ENDPOINT.to_string(),
            token_url: TOKEN_ENDPOINT.to_string(),
            expiry_margin: Duration::from_secs(DEFAULT_EXPIRY_MARGIN_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            state_ttl: Duration::from_secs(STATE_TTL_SECS),
        }
    }
}

impl OAuthSettings {
    /// Configured credentials, or `MissingCredentials` if either half is absent.
    pub fn credentials(&self) -> Result<&ClientCredentials> {
        match &self.credentials {
            Some(c) if !c.client_id.is_empty() && !c.client_secret.expose().is_empty() => Ok(c),
            _ => Err(Error::MissingCredentials),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials().is_ok()
    }

    /// Requested scopes as a set, the shape stored on `TokenRecord`.
    pub fn scope_set(&self) -> BTreeSet<String> {
        self.scopes.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_whoop() {
        let settings = OAuthSettings::default();
        assert_eq!(settings.token_url, TOKEN_ENDPOINT);
        assert_eq!(settings.authorize_url, AUTHORIZE_ENDPOINT);
        assert!(settings.scopes.iter().any(|s| s == "offline"));
        assert_eq!(settings.state_ttl, Duration::from_secs(600));
        assert!(!settings.has_credentials());
    }

    #[test]
    fn empty_secret_counts_as_missing() {
        let settings = OAuthSettings {
            credentials: Some(ClientCredentials::new("client-abc", "")),
            ..OAuthSettings::default()
        };
        assert!(matches!(
            settings.credentials(),
            Err(Error::MissingCredentials)
        ));
    }

    #[test]
    fn configured_credentials_are_returned() {
        let settings = OAuthSettings {
            credentials: Some(ClientCredentials::new("client-abc", "secret-xyz")),
            ..OAuthSettings::default()
        };
        let creds = settings.credentials().unwrap();
        assert_eq!(creds.client_id, "client-abc");
        assert_eq!(creds.client_secret.expose(), "secret-xyz");
    }

    #[test]
    fn scope_set_deduplicates() {
        let settings = OAuthSettings {
            scopes: vec!["offline".into(), "read:sleep".into(), "offline".into()],
            ..OAuthSettings::default()
        };
        assert_eq!(settings.scope_set().len(), 2);
    }
}
