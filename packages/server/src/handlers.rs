//! Request handlers.
//!
//! Protocol errors are part of the OAI-PMH document, so `/oai` answers 200
//! for every request the engine could process.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;

use crate::state::AppState;

const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

pub async fn oai_get(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    respond(&state, params).await
}

pub async fn oai_post(
    State(state): State<AppState>,
    Form(params): Form<Vec<(String, String)>>,
) -> Response {
    respond(&state, params).await
}

pub async fn health() -> &'static str {
    "OK"
}

async fn respond(state: &AppState, params: Vec<(String, String)>) -> Response {
    let engine = Arc::clone(&state.engine);
    match tokio::task::spawn_blocking(move || engine.respond(params)).await {
        Ok(Ok(xml)) => ([(header::CONTENT_TYPE, XML_CONTENT_TYPE)], xml).into_response(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "failed to write OAI-PMH response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "request task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
