use super::{page_response, session_from_headers};
use crate::page::{Notice, NOTHING_CAPTURED_MESSAGE, PREDICTION_FAILED_MESSAGE};
use crate::prediction::PredictionOutcome;
use crate::server::SharedState;
use crate::session::{PredictionTicket, SessionError, SessionId};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use std::time::Instant;
use tracing::instrument;

/// Arms the session and runs one full request cycle against the endpoint.
#[instrument(skip(state, headers))]
pub async fn predict(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    state.metrics.record_request("predict");

    let (id, created) = state.sessions.resolve(session_from_headers(&headers));

    let armed = state
        .sessions
        .with_session(&id, |session| {
            session.on_submit_predict()?;
            session
                .begin_prediction()
                .ok_or(SessionError::NothingCaptured)
        })
        .unwrap_or(Err(SessionError::NothingCaptured));

    let ticket = match armed {
        Ok(ticket) => ticket,
        Err(e) => {
            tracing::info!(session = %id, "Prediction not started: {}", e);
            return page_response(
                &state,
                &id,
                created,
                StatusCode::CONFLICT,
                Some(Notice::Error(NOTHING_CAPTURED_MESSAGE)),
            );
        }
    };

    // The cycle runs on its own task so it completes even if the client
    // goes away and this handler is dropped.
    let cycle = tokio::spawn(run_cycle(state.clone(), id.clone(), ticket));
    let succeeded = match cycle.await {
        Ok(succeeded) => succeeded,
        Err(e) => {
            tracing::error!(session = %id, "Prediction task failed: {:?}", e);
            false
        }
    };

    if succeeded {
        page_response(&state, &id, created, StatusCode::OK, None)
    } else {
        page_response(
            &state,
            &id,
            created,
            StatusCode::BAD_GATEWAY,
            Some(Notice::Error(PREDICTION_FAILED_MESSAGE)),
        )
    }
}

/// Sends the ticket's image and closes its cycle on the session.
async fn run_cycle(state: SharedState, id: SessionId, ticket: PredictionTicket) -> bool {
    let PredictionTicket { cycle, image } = ticket;

    let start_time = Instant::now();
    let outcome = PredictionOutcome::from(state.prediction_client.predict(&image).await);
    drop(image);
    let duration_ms = start_time.elapsed().as_millis() as u64;
    state.metrics.record_prediction(duration_ms, outcome.as_str());

    match &outcome {
        PredictionOutcome::Label(label) => {
            tracing::info!(session = %id, cycle, label = %label, duration_ms, "Prediction succeeded");
        }
        PredictionOutcome::Failed(e) => {
            tracing::error!(
                session = %id,
                cycle,
                kind = e.kind(),
                duration_ms,
                "Prediction failed: {}",
                e
            );
        }
    }

    if state
        .sessions
        .with_session(&id, |session| session.complete_prediction(cycle, &outcome))
        .is_none()
    {
        tracing::warn!(session = %id, "Session expired while the prediction was running");
    }

    matches!(outcome, PredictionOutcome::Label(_))
}
