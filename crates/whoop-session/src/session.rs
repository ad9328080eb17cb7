//! Token lifecycle state machine
//!
//! One `Session` per process owns the authorization state. Every operation that
//! reads and then writes the stored record (callback completion, lazy refresh,
//! manual refresh, clear) runs under a single async lock, so two concurrent
//! requests that find an expired token trigger exactly one refresh and the
//! second sees the first one's result.
//!
//! ```text
//! Unauthenticated --begin_authorization--> Authorizing --callback ok--> Authenticated
//!        ^                                     |                          |      ^
//!        |                              callback failed              expires   refresh ok
//!        |                                     v                          v      |
//!        +---------------------------- (store decides) <-- rejected -- Expired --+
//! ```

use std::sync::Arc;

use common::Clock;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use whoop_auth::{
    OAuthSettings, StateTracker, TokenExchanger, TokenRecord, TokenStore,
    build_authorization_url,
};

use crate::error::{Error, Result};

/// Externally visible authorization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    Authorizing,
    Authenticated,
    /// A record is stored but its access token has passed `expires_at`.
    Expired,
}

impl SessionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Unauthenticated => "unauthenticated",
            SessionStatus::Authorizing => "authorizing",
            SessionStatus::Authenticated => "authenticated",
            SessionStatus::Expired => "expired",
        }
    }
}

/// Query parameters the provider appends to the redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Phase tracked under the lock. `Expired` is derived from the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unauthenticated,
    Authorizing,
    Authenticated,
}

pub struct Session {
    settings: Arc<OAuthSettings>,
    store: Arc<dyn TokenStore>,
    exchanger: Arc<dyn TokenExchanger>,
    states: StateTracker,
    clock: Arc<dyn Clock>,
    phase: Mutex<Phase>,
}

impl Session {
    /// Build a session, restoring `Authenticated` if the store already holds a record.
    pub async fn new(
        settings: Arc<OAuthSettings>,
        store: Arc<dyn TokenStore>,
        exchanger: Arc<dyn TokenExchanger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let phase = match store.load().await.map_err(storage)? {
            Some(record) => {
                info!(
                    expires_at = record.expires_at,
                    expired = record.is_expired(clock.now_millis()),
                    "restored stored token record"
                );
                Phase::Authenticated
            }
            None => Phase::Unauthenticated,
        };

        let states = StateTracker::new(settings.state_ttl, clock.clone());
        Ok(Self {
            settings,
            store,
            exchanger,
            states,
            clock,
            phase: Mutex::new(phase),
        })
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    pub fn has_credentials(&self) -> bool {
        self.settings.has_credentials()
    }

    /// Issue a state nonce and return the provider URL to redirect the browser to.
    pub async fn begin_authorization(&self) -> Result<String> {
        let credentials = self.settings.credentials().map_err(configuration)?;

        let nonce = self.states.issue().await;
        let url = match build_authorization_url(&self.settings, &credentials.client_id, &nonce) {
            Ok(url) => url,
            Err(e) => {
                self.states.consume(&nonce).await;
                return Err(configuration(e));
            }
        };

        *self.phase.lock().await = Phase::Authorizing;
        info!("authorization flow started");
        Ok(url)
    }

    /// Complete the authorization round trip.
    ///
    /// Checks run in a fixed order: provider error, state nonce, code,
    /// credentials. The exchanger is only called once all of them pass, so an
    /// invalid or replayed state never reaches the token endpoint.
    pub async fn handle_callback(&self, params: CallbackParams) -> Result<()> {
        let mut phase = self.phase.lock().await;

        if let Some(error) = params.error.filter(|e| !e.is_empty()) {
            let reason = match params.error_description {
                Some(description) if !description.is_empty() => format!("{error}: {description}"),
                _ => error,
            };
            warn!(reason = %reason, "provider reported an authorization error");
            *phase = self.settled_phase().await;
            return Err(Error::Authorization(reason));
        }

        let state = params.state.unwrap_or_default();
        if !self.states.consume(&state).await {
            warn!(
                security_event = true,
                "callback rejected: state is unknown, expired, or already used"
            );
            return Err(Error::Csrf);
        }

        let code = match params.code {
            Some(code) if !code.is_empty() => code,
            _ => {
                warn!("callback carried no authorization code");
                *phase = self.settled_phase().await;
                return Err(Error::Authorization("no authorization code received".into()));
            }
        };

        if let Err(e) = self.settings.credentials() {
            *phase = self.settled_phase().await;
            return Err(configuration(e));
        }

        let record = match self
            .exchanger
            .exchange_code(&code, &self.settings.redirect_uri)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, status = ?e.status(), "authorization code exchange failed");
                *phase = self.settled_phase().await;
                return Err(Error::Exchange(e));
            }
        };

        if let Err(e) = self.store.save(&record).await {
            warn!(error = %e, "failed to persist token record");
            *phase = self.settled_phase().await;
            return Err(storage(e));
        }

        *phase = Phase::Authenticated;
        info!(
            expires_at = record.expires_at,
            scope = %record.scope_string(),
            "authorization completed"
        );
        Ok(())
    }

    /// Return an access token that is not expired, refreshing it first if needed.
    pub async fn get_valid_token(&self) -> Result<String> {
        let mut phase = self.phase.lock().await;

        let Some(record) = self.store.load().await.map_err(storage)? else {
            if *phase == Phase::Authenticated {
                *phase = Phase::Unauthenticated;
            }
            return Err(Error::AuthenticationRequired);
        };

        if !record.is_expired(self.clock.now_millis()) {
            return Ok(record.access_token);
        }

        debug!(expires_at = record.expires_at, "access token expired, refreshing");
        let fresh = self.refresh_locked(&mut phase, record).await?;
        Ok(fresh.access_token)
    }

    /// Refresh regardless of expiry.
    pub async fn refresh_now(&self) -> Result<TokenRecord> {
        let mut phase = self.phase.lock().await;
        let record = self
            .store
            .load()
            .await
            .map_err(storage)?
            .ok_or(Error::AuthenticationRequired)?;
        self.refresh_locked(&mut phase, record).await
    }

    /// Forget the stored record. Idempotent.
    pub async fn clear(&self) -> Result<()> {
        let mut phase = self.phase.lock().await;
        *phase = Phase::Unauthenticated;
        self.store.clear().await.map_err(storage)?;
        info!("stored token record cleared");
        Ok(())
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        let phase = self.phase.lock().await;
        match *phase {
            Phase::Unauthenticated => Ok(SessionStatus::Unauthenticated),
            Phase::Authorizing => Ok(SessionStatus::Authorizing),
            Phase::Authenticated => match self.store.load().await.map_err(storage)? {
                Some(record) if record.is_expired(self.clock.now_millis()) => {
                    Ok(SessionStatus::Expired)
                }
                Some(_) => Ok(SessionStatus::Authenticated),
                None => Ok(SessionStatus::Unauthenticated),
            },
        }
    }

    /// Snapshot of the stored record, if any.
    pub async fn current_record(&self) -> Result<Option<TokenRecord>> {
        self.store.load().await.map_err(storage)
    }

    /// Run the refresh grant with the lock already held.
    ///
    /// A provider rejection clears the store: the refresh token is dead and
    /// only a new authorization can recover. A transport failure keeps the
    /// record so the next call can try again.
    async fn refresh_locked(&self, phase: &mut Phase, prior: TokenRecord) -> Result<TokenRecord> {
        self.settings.credentials().map_err(configuration)?;

        match self.exchanger.refresh(&prior.refresh_token).await {
            Ok(mut fresh) => {
                if fresh.scope.is_empty() {
                    fresh.scope = prior.scope;
                }
                self.store.save(&fresh).await.map_err(storage)?;
                *phase = Phase::Authenticated;
                info!(expires_at = fresh.expires_at, "access token refreshed");
                Ok(fresh)
            }
            Err(e) if e.is_rejection() => {
                warn!(error = %e, "refresh token rejected, clearing stored record");
                *phase = Phase::Unauthenticated;
                self.store.clear().await.map_err(storage)?;
                Err(Error::ReauthorizationRequired(e.to_string()))
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, keeping stored record");
                Err(Error::Exchange(e))
            }
        }
    }

    /// Phase implied by the store after a failed callback.
    async fn settled_phase(&self) -> Phase {
        match self.store.load().await {
            Ok(Some(_)) => Phase::Authenticated,
            _ => Phase::Unauthenticated,
        }
    }
}

fn storage(e: whoop_auth::Error) -> Error {
    Error::Storage(e.to_string())
}

fn configuration(e: whoop_auth::Error) -> Error {
    Error::Configuration(e.to_string())
}
