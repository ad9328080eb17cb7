//! OAuth routes
//!
//! Endpoints:
//! - GET  /               status page: credentials configured, session state, token summary
//! - GET  /authorize      start the flow, 303 to the WHOOP consent page
//! - GET  /callback       provider redirect target, 303 to `/?success=true`
//! - GET  /tokens         stored tokens, truncated
//! - POST /refresh_token  refresh now regardless of expiry
//! - POST /test_api       fetch the basic profile with the current token
//! - POST /clear_tokens   forget the stored tokens

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use common::Clock;
use serde::Deserialize;
use tracing::info;
use whoop_auth::TokenRecord;
use whoop_session::CallbackParams;

use crate::AppState;
use crate::error::{AppError, new_request_id};
use crate::metrics::record_oauth_event;

/// Characters of each token shown by `/tokens`.
const TOKEN_PREVIEW_CHARS: usize = 20;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/authorize", get(authorize))
        .route("/callback", get(callback))
        .route("/tokens", get(tokens))
        .route("/refresh_token", post(refresh_token))
        .route("/test_api", post(test_api))
        .route("/clear_tokens", post(clear_tokens))
}

/// Flags set by the redirects below.
#[derive(Debug, Default, Deserialize)]
struct IndexQuery {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    refreshed: bool,
    #[serde(default)]
    cleared: bool,
}

fn json(status: StatusCode, body: serde_json::Value) -> Response {
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

fn token_summary(record: &TokenRecord, now_millis: u64) -> serde_json::Value {
    serde_json::json!({
        "token_type": record.token_type,
        "expires_at": record.expires_at,
        "expired": record.is_expired(now_millis),
        "scope": record.scope,
    })
}

fn preview(token: &str) -> String {
    let head: String = token.chars().take(TOKEN_PREVIEW_CHARS).collect();
    format!("{head}...")
}

async fn index(State(state): State<AppState>, Query(query): Query<IndexQuery>) -> Response {
    let request_id = new_request_id();
    let status = match state.session.status().await {
        Ok(s) => s,
        Err(e) => return AppError::from(e).into_response(&request_id),
    };
    let record = match state.session.current_record().await {
        Ok(r) => r,
        Err(e) => return AppError::from(e).into_response(&request_id),
    };

    let message = if query.success {
        Some("authorization completed")
    } else if query.refreshed {
        Some("token refreshed")
    } else if query.cleared {
        Some("tokens cleared")
    } else {
        None
    };

    let now = state.clock.now_millis();
    json(
        StatusCode::OK,
        serde_json::json!({
            "client_configured": state.session.has_credentials(),
            "session": status.label(),
            "token": record.as_ref().map(|r| token_summary(r, now)),
            "message": message,
        }),
    )
}

async fn authorize(State(state): State<AppState>) -> Response {
    let request_id = new_request_id();
    match state.session.begin_authorization().await {
        Ok(url) => {
            record_oauth_event("authorize", "success");
            Redirect::to(&url).into_response()
        }
        Err(e) => {
            record_oauth_event("authorize", e.kind());
            AppError::from(e).into_response(&request_id)
        }
    }
}

async fn callback(State(state): State<AppState>, Query(params): Query<CallbackParams>) -> Response {
    let request_id = new_request_id();
    match state.session.handle_callback(params).await {
        Ok(()) => {
            record_oauth_event("callback", "success");
            Redirect::to("/?success=true").into_response()
        }
        Err(e) => {
            record_oauth_event("callback", e.kind());
            AppError::from(e).into_response(&request_id)
        }
    }
}

async fn tokens(State(state): State<AppState>) -> Response {
    let request_id = new_request_id();
    match state.session.current_record().await {
        Ok(Some(record)) => {
            let mut body = token_summary(&record, state.clock.now_millis());
            body["access_token"] = preview(&record.access_token).into();
            body["refresh_token"] = preview(&record.refresh_token).into();
            json(StatusCode::OK, body)
        }
        Ok(None) => json(
            StatusCode::OK,
            serde_json::json!({ "message": "No tokens found" }),
        ),
        Err(e) => AppError::from(e).into_response(&request_id),
    }
}

async fn refresh_token(State(state): State<AppState>) -> Response {
    let request_id = new_request_id();
    match state.session.refresh_now().await {
        Ok(record) => {
            record_oauth_event("refresh", "success");
            info!(request_id, expires_at = record.expires_at, "manual refresh completed");
            Redirect::to("/?refreshed=true").into_response()
        }
        Err(e) => {
            record_oauth_event("refresh", e.kind());
            AppError::from(e).into_response(&request_id)
        }
    }
}

async fn test_api(State(state): State<AppState>) -> Response {
    let request_id = new_request_id();
    let token = match state.session.get_valid_token().await {
        Ok(token) => token,
        Err(e) => return AppError::from(e).into_response(&request_id),
    };
    match state.whoop.profile(&token).await {
        Ok(profile) => json(
            StatusCode::OK,
            serde_json::json!({
                "success": true,
                "data": profile,
            }),
        ),
        Err(e) => AppError::from(e).into_response(&request_id),
    }
}

async fn clear_tokens(State(state): State<AppState>) -> Response {
    let request_id = new_request_id();
    match state.session.clear().await {
        Ok(()) => {
            record_oauth_event("clear", "success");
            Redirect::to("/?cleared=true").into_response()
        }
        Err(e) => {
            record_oauth_event("clear", e.kind());
            AppError::from(e).into_response(&request_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_to_twenty_chars() {
        assert_eq!(
            preview("abcdefghijklmnopqrstuvwxyz0123456789"),
            "abcdefghijklmnopqrst..."
        );
        assert_eq!(preview("short"), "short...");
    }
}
