use super::{session_from_headers, with_session_cookie};
use crate::server::SharedState;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use tracing::instrument;

#[instrument(skip(state, headers))]
pub async fn dismiss(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    state.metrics.record_request("dismiss");

    let (id, created) = state.sessions.resolve(session_from_headers(&headers));
    state.sessions.with_session(&id, |session| session.on_dismiss_popup());

    with_session_cookie(Redirect::to("/").into_response(), &id, created)
}
