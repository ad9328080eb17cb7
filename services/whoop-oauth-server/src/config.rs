//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults.
//! The client secret is loaded from WHOOP_CLIENT_SECRET or client_secret_file,
//! never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use whoop_auth::{ClientCredentials, OAuthSettings};

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub whoop: WhoopConfig,
    pub storage: StorageConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 100,
        }
    }
}

/// WHOOP application registration and OAuth endpoints
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WhoopConfig {
    pub client_id: Option<String>,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to WHOOP_CLIENT_SECRET)
    pub client_secret_file: Option<PathBuf>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
    pub expiry_safety_margin_secs: u64,
    pub timeout_secs: u64,
    pub state_ttl_secs: u64,
}

impl Default for WhoopConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            client_secret_file: None,
            redirect_uri: whoop_auth::DEFAULT_REDIRECT_URI.to_string(),
            scopes: whoop_auth::DEFAULT_SCOPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            authorize_url: whoop_auth::AUTHORIZE_ENDPOINT.to_string(),
            token_url: whoop_auth::TOKEN_ENDPOINT.to_string(),
            api_base_url: whoop_auth::API_BASE_URL.to_string(),
            expiry_safety_margin_secs: whoop_auth::DEFAULT_EXPIRY_MARGIN_SECS,
            timeout_secs: whoop_auth::DEFAULT_TIMEOUT_SECS,
            state_ttl_secs: whoop_auth::STATE_TTL_SECS,
        }
    }
}

/// Token persistence
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub token_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_file: PathBuf::from("whoop_tokens.json"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// A missing file yields defaults so the server can run on env vars alone.
    ///
    /// Client secret resolution order:
    /// 1. WHOOP_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let mut config: Config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };

        if let Some(id) = non_empty_env("WHOOP_CLIENT_ID") {
            config.whoop.client_id = Some(id);
        }
        if let Some(base) = non_empty_env("WHOOP_API_BASE") {
            config.whoop.api_base_url = base;
        }

        // Resolve client secret: env var takes precedence over file
        if let Some(secret) = non_empty_env("WHOOP_CLIENT_SECRET") {
            config.whoop.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.whoop.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.whoop.client_secret = Some(Secret::new(secret));
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        let whoop = &self.whoop;
        for (name, url) in [
            ("redirect_uri", &whoop.redirect_uri),
            ("authorize_url", &whoop.authorize_url),
            ("token_url", &whoop.token_url),
            ("api_base_url", &whoop.api_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if whoop.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if whoop.state_ttl_secs == 0 {
            return Err(common::Error::Config(
                "state_ttl_secs must be greater than 0".into(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if whoop.scopes.iter().all(|s| s.trim().is_empty()) {
            return Err(common::Error::Config("scopes must not be empty".into()));
        }
        Ok(())
    }

    /// Whether both halves of the client credentials are present.
    pub fn client_configured(&self) -> bool {
        self.credentials().is_some()
    }

    fn credentials(&self) -> Option<ClientCredentials> {
        let id = self.whoop.client_id.as_deref().filter(|id| !id.is_empty())?;
        let secret = self.whoop.client_secret.as_ref()?;
        Some(ClientCredentials::new(id, secret.expose().clone()))
    }

    /// OAuth settings shared by the exchanger and the session.
    pub fn oauth_settings(&self) -> OAuthSettings {
        let whoop = &self.whoop;
        OAuthSettings {
            credentials: self.credentials(),
            redirect_uri: whoop.redirect_uri.clone(),
            scopes: whoop
                .scopes
                .iter()
                .filter(|s| !s.trim().is_empty())
                .cloned()
                .collect(),
            authorize_url: whoop.authorize_url.clone(),
            token_url: whoop.token_url.clone(),
            expiry_margin: Duration::from_secs(whoop.expiry_safety_margin_secs),
            timeout: self.timeout(),
            state_ttl: Duration::from_secs(whoop.state_ttl_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.whoop.timeout_secs)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("whoop-oauth.toml")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
