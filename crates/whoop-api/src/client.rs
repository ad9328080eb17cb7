//! HTTP client for WHOOP v2 read endpoints

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::params::WindowParams;

/// Paths relative to the API base URL (`https://api.prod.whoop.com/developer`).
pub mod endpoints {
    pub const PROFILE: &str = "/v2/user/profile/basic";
    pub const BODY_MEASUREMENT: &str = "/v2/user/measurement/body";
    pub const CYCLES: &str = "/v2/cycle";
    pub const SLEEPS: &str = "/v2/activity/sleep";
    pub const WORKOUTS: &str = "/v2/activity/workout";
}

/// Upper bound on pages followed by `collect_all`.
const MAX_PAGES: usize = 200;

pub struct WhoopClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl WhoopClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with the bearer token.
    ///
    /// A success body that is empty or not JSON yields `{}`.
    pub async fn get(&self, token: &str, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .timeout(self.timeout)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let reset = response
                .headers()
                .get("X-RateLimit-Reset")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            warn!(path, reset = ?reset, "WHOOP API rate limit hit");
            return Err(Error::RateLimited { reset });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            warn!(path, status = status.as_u16(), "WHOOP API request failed");
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(json!({}));
        }
        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(e) => {
                debug!(path, error = %e, "non-JSON success body, returning empty object");
                Ok(json!({}))
            }
        }
    }

    pub async fn profile(&self, token: &str) -> Result<Value> {
        self.get(token, endpoints::PROFILE, &[]).await
    }

    pub async fn body_measurement(&self, token: &str) -> Result<Value> {
        self.get(token, endpoints::BODY_MEASUREMENT, &[]).await
    }

    pub async fn cycles(&self, token: &str, params: &WindowParams) -> Result<Value> {
        self.get(token, endpoints::CYCLES, &params.to_query()?).await
    }

    pub async fn cycle(&self, token: &str, id: &str) -> Result<Value> {
        let path = format!("{}/{}", endpoints::CYCLES, checked_id(id)?);
        self.get(token, &path, &[]).await
    }

    /// The sleep belonging to one cycle.
    pub async fn cycle_sleep(&self, token: &str, cycle_id: &str) -> Result<Value> {
        let path = format!("{}/{}/sleep", endpoints::CYCLES, checked_id(cycle_id)?);
        self.get(token, &path, &[]).await
    }

    pub async fn sleeps(&self, token: &str, params: &WindowParams) -> Result<Value> {
        self.get(token, endpoints::SLEEPS, &params.to_query()?).await
    }

    pub async fn sleep(&self, token: &str, id: &str) -> Result<Value> {
        let path = format!("{}/{}", endpoints::SLEEPS, checked_id(id)?);
        self.get(token, &path, &[]).await
    }

    pub async fn workouts(&self, token: &str, params: &WindowParams) -> Result<Value> {
        self.get(token, endpoints::WORKOUTS, &params.to_query()?).await
    }

    pub async fn workout(&self, token: &str, id: &str) -> Result<Value> {
        let path = format!("{}/{}", endpoints::WORKOUTS, checked_id(id)?);
        self.get(token, &path, &[]).await
    }

    /// Walk a collection until the continuation token runs out.
    ///
    /// Accepts both `next_token` and `nextToken` in page bodies. Pages without
    /// a `records` array contribute nothing.
    pub async fn collect_all(
        &self,
        token: &str,
        path: &str,
        params: &WindowParams,
    ) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page_params = WindowParams {
            next_token: None,
            ..params.clone()
        };

        for page in 1..=MAX_PAGES {
            let mut body = self.get(token, path, &page_params.to_query()?).await?;

            match body.get_mut("records").map(Value::take) {
                Some(Value::Array(records)) => items.extend(records),
                Some(Value::Null) | None => {}
                Some(other) => {
                    return Err(Error::Decode(format!(
                        "`records` is not an array on page {page}: {other}"
                    )));
                }
            }

            let next = body
                .get("next_token")
                .or_else(|| body.get("nextToken"))
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty());
            match next {
                Some(next) => page_params = page_params.with_next_token(next),
                None => {
                    debug!(path, pages = page, records = items.len(), "collection complete");
                    return Ok(items);
                }
            }
        }

        Err(Error::Decode(format!(
            "pagination did not terminate after {MAX_PAGES} pages"
        )))
    }
}

/// Record ids are numeric (cycles, older records) or UUIDs (sleeps, workouts).
fn checked_id(id: &str) -> Result<&str> {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        Ok(id)
    } else {
        Err(Error::InvalidParams(format!("invalid record id: {id:?}")))
    }
}
