//! Query parameters for collection endpoints

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 25;

/// Time window and paging for cycle, sleep, and workout collections.
///
/// `start` and `end` are ISO-8601 timestamps passed through as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WindowParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub limit: Option<u32>,
    pub next_token: Option<String>,
}

impl WindowParams {
    /// Effective page size, rejecting values outside `1..=25`.
    pub fn limit(&self) -> Result<u32> {
        match self.limit {
            None => Ok(DEFAULT_LIMIT),
            Some(n) if (1..=MAX_LIMIT).contains(&n) => Ok(n),
            Some(n) => Err(Error::InvalidParams(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {n}"
            ))),
        }
    }

    /// Upstream query pairs. The continuation token is sent as `nextToken`.
    pub fn to_query(&self) -> Result<Vec<(&'static str, String)>> {
        let mut query = vec![("limit", self.limit()?.to_string())];
        if let Some(start) = non_empty(&self.start) {
            query.push(("start", start.to_string()));
        }
        if let Some(end) = non_empty(&self.end) {
            query.push(("end", end.to_string()));
        }
        if let Some(token) = non_empty(&self.next_token) {
            query.push(("nextToken", token.to_string()));
        }
        Ok(query)
    }

    pub fn with_next_token(&self, token: impl Into<String>) -> Self {
        Self {
            next_token: Some(token.into()),
            ..self.clone()
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
