use super::{page_response, session_from_headers};
use crate::server::SharedState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use tracing::instrument;

#[instrument(skip(state, headers))]
pub async fn index(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    state.metrics.record_request("index");

    let (id, created) = state.sessions.resolve(session_from_headers(&headers));
    page_response(&state, &id, created, StatusCode::OK, None)
}
