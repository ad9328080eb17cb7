//! Read-only WHOOP data routes
//!
//! Every handler obtains its bearer through `Session::get_valid_token`, so an
//! expired access token is refreshed before the upstream call. Collection
//! routes accept `start`, `end`, `limit`, `next_token`, and `all=true` to walk
//! every page.

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use whoop_api::{WindowParams, endpoints};

use crate::AppState;
use crate::error::{AppError, new_request_id};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/profile", get(profile))
        .route("/api/body_measurement", get(body_measurement))
        .route("/api/cycles", get(cycles))
        .route("/api/cycles/{id}", get(cycle))
        .route("/api/cycles/{id}/sleep", get(cycle_sleep))
        .route("/api/sleep", get(sleeps))
        .route("/api/sleep/{id}", get(sleep))
        .route("/api/workouts", get(workouts))
        .route("/api/workouts/{id}", get(workout))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    start: Option<String>,
    end: Option<String>,
    limit: Option<u32>,
    next_token: Option<String>,
    #[serde(default)]
    all: bool,
}

impl ListQuery {
    fn window(&self) -> WindowParams {
        WindowParams {
            start: self.start.clone(),
            end: self.end.clone(),
            limit: self.limit,
            next_token: self.next_token.clone(),
        }
    }
}

fn respond(request_id: &str, result: Result<serde_json::Value, AppError>) -> Response {
    match result {
        Ok(body) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response(),
        Err(e) => e.into_response(request_id),
    }
}

async fn bearer(state: &AppState) -> Result<String, AppError> {
    Ok(state.session.get_valid_token().await?)
}

/// One page, or every page as `{"records": [...]}` when `all=true`.
async fn list(state: &AppState, path: &str, query: &ListQuery) -> Result<serde_json::Value, AppError> {
    let token = bearer(state).await?;
    let window = query.window();
    if query.all {
        let records = state.whoop.collect_all(&token, path, &window).await?;
        Ok(serde_json::json!({ "records": records }))
    } else {
        Ok(state.whoop.get(&token, path, &window.to_query()?).await?)
    }
}

async fn profile(State(state): State<AppState>) -> Response {
    let request_id = new_request_id();
    let result = async {
        let token = bearer(&state).await?;
        Ok::<_, AppError>(state.whoop.profile(&token).await?)
    }
    .await;
    respond(&request_id, result)
}

async fn body_measurement(State(state): State<AppState>) -> Response {
    let request_id = new_request_id();
    let result = async {
        let token = bearer(&state).await?;
        Ok::<_, AppError>(state.whoop.body_measurement(&token).await?)
    }
    .await;
    respond(&request_id, result)
}

async fn cycles(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    let request_id = new_request_id();
    respond(&request_id, list(&state, endpoints::CYCLES, &query).await)
}

async fn cycle(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let request_id = new_request_id();
    let result = async {
        let token = bearer(&state).await?;
        Ok::<_, AppError>(state.whoop.cycle(&token, &id).await?)
    }
    .await;
    respond(&request_id, result)
}

async fn cycle_sleep(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let request_id = new_request_id();
    let result = async {
        let token = bearer(&state).await?;
        Ok::<_, AppError>(state.whoop.cycle_sleep(&token, &id).await?)
    }
    .await;
    respond(&request_id, result)
}

async fn sleeps(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    let request_id = new_request_id();
    respond(&request_id, list(&state, endpoints::SLEEPS, &query).await)
}

async fn sleep(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let request_id = new_request_id();
    let result = async {
        let token = bearer(&state).await?;
        Ok::<_, AppError>(state.whoop.sleep(&token, &id).await?)
    }
    .await;
    respond(&request_id, result)
}

async fn workouts(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    let request_id = new_request_id();
    respond(&request_id, list(&state, endpoints::WORKOUTS, &query).await)
}

async fn workout(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let request_id = new_request_id();
    let result = async {
        let token = bearer(&state).await?;
        Ok::<_, AppError>(state.whoop.workout(&token, &id).await?)
    }
    .await;
    respond(&request_id, result)
}
