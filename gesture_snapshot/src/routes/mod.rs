mod capture;
mod dismiss;
mod health;
mod index;
mod metrics;
mod predict;

use crate::page::{self, Notice, PageView};
use crate::server::SharedState;
use crate::session::SessionId;
use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};

pub const SESSION_COOKIE: &str = "gesture_session";

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index::index))
        .route("/capture", post(capture::capture))
        .route("/captured.jpg", get(capture::captured_image))
        .route("/predict", post(predict::predict))
        .route("/dismiss", post(dismiss::dismiss))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
}

/// Session id carried by the request's cookie, if it looks like one of ours.
pub(crate) fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| SessionId::parse(value))
}

/// Sets the session cookie on responses that started a new session.
pub(crate) fn with_session_cookie(mut response: Response, id: &SessionId, created: bool) -> Response {
    if created {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Failed to build session cookie: {:?}", e),
        }
    }
    response
}

/// Renders the session's page, optionally with a notice, as the response body.
pub(crate) fn page_response(
    state: &SharedState,
    id: &SessionId,
    created: bool,
    status: StatusCode,
    notice: Option<Notice>,
) -> Response {
    let view = state
        .sessions
        .with_session(id, |session| PageView::from_session(session, notice.clone()))
        .unwrap_or(PageView {
            notice,
            ..PageView::default()
        });

    with_session_cookie(
        (status, Html(page::render(&view))).into_response(),
        id,
        created,
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::PredictionServiceConfig;
    use crate::prediction::PredictionClient;
    use crate::session::SessionStore;
    use crate::telemetry::Metrics;
    use std::{sync::Arc, time::Duration};

    /// State wired to an endpoint nothing listens on.
    pub(crate) fn test_state() -> SharedState {
        let prediction_client = PredictionClient::new(&PredictionServiceConfig {
            endpoint: "http://127.0.0.1:9/predict".into(),
            source: "camera".into(),
            result_delay_ms: 0,
        })
        .unwrap();
        SharedState {
            sessions: Arc::new(SessionStore::new(Duration::from_secs(60))),
            prediction_client: Arc::new(prediction_client),
            metrics: Arc::new(Metrics::new().unwrap()),
        }
    }

    #[test]
    fn test_session_from_cookie_header() {
        let id = SessionId::generate();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {}={}", SESSION_COOKIE, id)).unwrap(),
        );

        assert_eq!(session_from_headers(&headers), Some(id));
    }

    #[test]
    fn test_foreign_or_malformed_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("gesture_session=../../etc; other=1"),
        );
        assert_eq!(session_from_headers(&headers), None);
        assert_eq!(session_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_cookie_only_set_for_new_sessions() {
        let id = SessionId::generate();

        let response = with_session_cookie("ok".into_response(), &id, true);
        let cookie = response.headers().get(header::SET_COOKIE).unwrap();
        assert!(cookie.to_str().unwrap().starts_with("gesture_session="));

        let response = with_session_cookie("ok".into_response(), &id, false);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }
}
