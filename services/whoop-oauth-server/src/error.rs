//! HTTP error mapping
//!
//! Session and API failures become JSON bodies of the shape
//! `{"error":{"type":"...","message":"...","request_id":"req_..."}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// A failed request, tagged with the id it will be reported under.
#[derive(Debug)]
pub enum AppError {
    Session(whoop_session::Error),
    Api(whoop_api::Error),
}

impl From<whoop_session::Error> for AppError {
    fn from(e: whoop_session::Error) -> Self {
        AppError::Session(e)
    }
}

impl From<whoop_api::Error> for AppError {
    fn from(e: whoop_api::Error) -> Self {
        AppError::Api(e)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        use whoop_session::Error as S;
        match self {
            AppError::Session(e) => match e {
                S::Configuration(_) | S::Csrf | S::Authorization(_) => StatusCode::BAD_REQUEST,
                S::Exchange(_) => StatusCode::BAD_GATEWAY,
                S::AuthenticationRequired | S::ReauthorizationRequired(_) => {
                    StatusCode::UNAUTHORIZED
                }
                S::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Api(e) => match e {
                whoop_api::Error::InvalidParams(_) => StatusCode::BAD_REQUEST,
                whoop_api::Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                whoop_api::Error::Status { status: 404, .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Session(e) => e.kind(),
            AppError::Api(whoop_api::Error::Http(_)) => "upstream_unreachable",
            AppError::Api(whoop_api::Error::RateLimited { .. }) => "rate_limited",
            AppError::Api(whoop_api::Error::Status { .. }) => "upstream_error",
            AppError::Api(whoop_api::Error::InvalidParams(_)) => "invalid_request",
            AppError::Api(whoop_api::Error::Decode(_)) => "upstream_error",
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Session(e) => e.to_string(),
            AppError::Api(e) => e.to_string(),
        }
    }

    pub fn into_response(self, request_id: &str) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(request_id, kind = self.kind(), error = %self.message(), "request failed");
        }
        let mut response = error_response(status, self.kind(), &self.message(), request_id);
        if let AppError::Api(whoop_api::Error::RateLimited { reset: Some(reset) }) = &self
            && let Ok(value) = reset.parse()
        {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, value);
        }
        response
    }
}

/// JSON error body with the given type label.
pub fn error_response(status: StatusCode, kind: &str, message: &str, request_id: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": kind,
            "message": message,
            "request_id": request_id,
        }
    });
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

pub fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}
