//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (callback completion)
//! 2. Token refresh (lazy on expiry, or manual)
//!
//! Both POST form-encoded grants to the token endpoint and produce a
//! `TokenRecord`. Neither retries: authorization codes are single-use, and a
//! timed-out refresh is surfaced so the caller can retry the whole operation.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use common::Clock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::DEFAULT_TOKEN_TYPE;
use crate::error::{Error, Result};
use crate::settings::OAuthSettings;

/// The persisted token pair.
///
/// `expires_at` is a unix timestamp in milliseconds (absolute, not a delta),
/// already reduced by the safety margin.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: u64,
    pub scope: BTreeSet<String>,
}

impl TokenRecord {
    /// Expired once `now >= expires_at`.
    pub fn is_expired(&self, now_millis: u64) -> bool {
        now_millis >= self.expires_at
    }

    /// Scopes joined the way the provider reports them.
    pub fn scope_string(&self) -> String {
        self.scope.iter().cloned().collect::<Vec<_>>().join(" ")
    }

    /// Reject records that were not written as a whole.
    pub fn validate(&self) -> Result<()> {
        if self.access_token.is_empty() || self.refresh_token.is_empty() {
            return Err(Error::CredentialParse(
                "token record is missing access_token or refresh_token".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// `issued_at + expires_in - margin`, all saturating.
pub fn compute_expires_at(issued_at_millis: u64, expires_in_secs: u64, margin: Duration) -> u64 {
    issued_at_millis
        .saturating_add(expires_in_secs.saturating_mul(1000))
        .saturating_sub(margin.as_millis() as u64)
}

/// Response body from the token endpoint for both grants.
///
/// `refresh_token` is optional because WHOOP may not rotate it on refresh.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    expires_in: u64,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Performs the code and refresh grants against a token endpoint.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn TokenExchanger>`), so the session can run against a fake.
pub trait TokenExchanger: Send + Sync {
    /// Trade a single-use authorization code for a token pair.
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        redirect_uri: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenRecord>> + Send + 'a>>;

    /// Trade a refresh token for a new token pair. When the provider does not
    /// return a new refresh token, the one passed in is kept.
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenRecord>> + Send + 'a>>;
}

/// `TokenExchanger` backed by the real token endpoint.
pub struct HttpExchanger {
    client: reqwest::Client,
    settings: Arc<OAuthSettings>,
    clock: Arc<dyn Clock>,
}

impl HttpExchanger {
    pub fn new(client: reqwest::Client, settings: Arc<OAuthSettings>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            settings,
            clock,
        }
    }

    /// POST one grant and parse the body. Only HTTP 200 counts as success.
    async fn request_token(&self, grant_type: &str, form: &[(&str, &str)]) -> Result<(TokenResponse, String)> {
        let response = self
            .client
            .post(&self.settings.token_url)
            .timeout(self.settings.timeout)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{grant_type} request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading {grant_type} response: {e}")))?;

        if status != reqwest::StatusCode::OK {
            warn!(grant_type, status = status.as_u16(), "token endpoint refused grant");
            return Err(Error::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| Error::MalformedResponse {
            status: status.as_u16(),
            reason: e.to_string(),
            body: body.clone(),
        })?;

        if parsed.access_token.is_empty() {
            return Err(Error::MalformedResponse {
                status: status.as_u16(),
                reason: "empty access_token".into(),
                body,
            });
        }

        Ok((parsed, body))
    }

    fn build_record(
        &self,
        response: TokenResponse,
        refresh_token: String,
        fallback_scope: BTreeSet<String>,
    ) -> TokenRecord {
        let scope = match response.scope {
            Some(s) if !s.trim().is_empty() => s.split_whitespace().map(str::to_string).collect(),
            _ => fallback_scope,
        };
        TokenRecord {
            access_token: response.access_token,
            refresh_token,
            token_type: response
                .token_type
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            expires_at: compute_expires_at(
                self.clock.now_millis(),
                response.expires_in,
                self.settings.expiry_margin,
            ),
            scope,
        }
    }
}

impl TokenExchanger for HttpExchanger {
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        redirect_uri: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenRecord>> + Send + 'a>> {
        Box::pin(async move {
            let credentials = self.settings.credentials()?;
            let (mut response, body) = self
                .request_token(
                    "authorization_code",
                    &[
                        ("grant_type", "authorization_code"),
                        ("code", code),
                        ("redirect_uri", redirect_uri),
                        ("client_id", credentials.client_id.as_str()),
                        ("client_secret", credentials.client_secret.expose().as_str()),
                    ],
                )
                .await?;

            let refresh_token = match response.refresh_token.take() {
                Some(t) if !t.is_empty() => t,
                _ => {
                    return Err(Error::MalformedResponse {
                        status: 200,
                        reason: "missing refresh_token (is the `offline` scope requested?)".into(),
                        body,
                    });
                }
            };

            let record = self.build_record(response, refresh_token, self.settings.scope_set());
            debug!(expires_at = record.expires_at, "authorization code exchanged");
            Ok(record)
        })
    }

    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenRecord>> + Send + 'a>> {
        Box::pin(async move {
            let credentials = self.settings.credentials()?;
            let (mut response, _body) = self
                .request_token(
                    "refresh_token",
                    &[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", refresh_token),
                        ("client_id", credentials.client_id.as_str()),
                        ("client_secret", credentials.client_secret.expose().as_str()),
                    ],
                )
                .await?;

            let rotated = response.refresh_token.take().filter(|t| !t.is_empty());
            let rotated_flag = rotated.is_some();
            let next_refresh = rotated.unwrap_or_else(|| refresh_token.to_string());

            // Empty fallback: the session carries the prior record's scopes forward
            let record = self.build_record(response, next_refresh, BTreeSet::new());
            debug!(
                expires_at = record.expires_at,
                rotated = rotated_flag,
                "access token refreshed"
            );
            Ok(record)
        })
    }
}
