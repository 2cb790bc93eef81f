// SPDX-FileCopyrightText: © 2025 Logyard Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The daemon's HTTP control API. This is the CLI's only way to reach the
//! daemon; every mutation goes through the config store — the source of
//! truth the drain manager reacts to — rather than touching a running
//! drain directly. `add`/`delete` write the store and return immediately;
//! the effect on the running drain set is observed asynchronously through
//! `list`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use logyard_core::state::DrainStateUpdate;
use logyard_core::uri::{construct_drain_uri, drain_config_from_uri};
use logyard_store::FileConfigStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileConfigStore>,
    pub states: Arc<Mutex<HashMap<String, DrainStateUpdate>>>,
}

#[derive(Deserialize)]
pub struct AddDrainRequest {
    pub uri: String,
}

#[derive(Serialize, Deserialize)]
pub struct DrainSummary {
    pub name: String,
    pub uri: String,
    pub state: Option<DrainStateUpdate>,
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/drains", get(list_drains))
        .route("/drains/{name}", axum::routing::put(add_drain).delete(delete_drain))
        .with_state(state)
}

async fn list_drains(State(state): State<AppState>) -> Result<Json<Vec<DrainSummary>>, ApiError> {
    let snapshot = state
        .store
        .load()
        .await
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let states = state.states.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

    let mut summaries: Vec<DrainSummary> = snapshot
        .drains
        .into_iter()
        .map(|(name, config)| {
            let uri = construct_drain_uri(&config);
            let state = states.get(&name).cloned();
            DrainSummary { name, uri, state }
        })
        .collect();
    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(summaries))
}

async fn add_drain(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<AddDrainRequest>,
) -> Result<StatusCode, ApiError> {
    // Validate before persisting: a malformed URI should never reach the
    // config store just to be rejected again by the watcher.
    let config =
        drain_config_from_uri(&name, &req.uri).map_err(|e| ApiError(StatusCode::BAD_REQUEST, e.to_string()))?;
    state
        .store
        .put_drain(&name, &construct_drain_uri(&config))
        .await
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_drain(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
    state
        .store
        .remove_drain(&name)
        .await
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn test_state(base: &std::path::Path) -> AppState {
        AppState { store: Arc::new(FileConfigStore::new(base)), states: Arc::new(Mutex::new(HashMap::new())) }
    }

    #[tokio::test]
    async fn add_then_list_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let add = Request::builder()
            .method("PUT")
            .uri("/drains/syslog")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"uri":"tcp://10.0.0.1:514?filters=systail."}"#))
            .unwrap();
        let response = app.clone().oneshot(add).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let list = Request::builder().uri("/drains").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(list).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let summaries: Vec<DrainSummary> = serde_json::from_slice(&body).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "syslog");

        let delete = Request::builder().method("DELETE").uri("/drains/syslog").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(delete).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let list = Request::builder().uri("/drains").body(Body::empty()).unwrap();
        let response = app.oneshot(list).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let summaries: Vec<DrainSummary> = serde_json::from_slice(&body).unwrap();
        assert!(summaries.is_empty());
    }

    #[tokio::test]
    async fn malformed_uri_is_rejected_before_touching_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let add = Request::builder()
            .method("PUT")
            .uri("/drains/bad")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"uri":"zmq://nope"}"#))
            .unwrap();
        let response = app.oneshot(add).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
