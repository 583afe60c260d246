mod app;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use thiserror::Error;
use tracing::instrument;

pub use app::App;

pub const GESTURE_LABELS: [&str; 10] = [
    "thumbs_up",
    "call_me",
    "fingers_crossed",
    "index_up",
    "okay",
    "paper",
    "rock",
    "rock_on",
    "scissor",
    "spock",
];

/// How the stub answers a well-formed prediction request.
#[derive(Debug, Clone)]
pub enum StubBehavior {
    Fixed(String),
    Random,
    Fail(StatusCode),
    /// 200 with a body that has no `prediction` field.
    MissingPrediction,
    /// Answers with the label once the delay has passed.
    Slow(String, Duration),
}

/// What the stub saw in the last request it accepted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceivedRequest {
    pub source: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub file: Vec<u8>,
}

#[derive(Clone)]
pub struct StubState {
    behavior: Arc<Mutex<StubBehavior>>,
    requests: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<ReceivedRequest>>>,
}

impl StubState {
    pub fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            requests: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_behavior(&self, behavior: StubBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ReceivedRequest> {
        self.last_request.lock().clone()
    }
}

#[derive(Error, Debug)]
pub enum StubError {
    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Missing `{0}` field")]
    MissingField(&'static str),
    #[error("Uploaded file is not an image: {0}")]
    NotAnImage(String),
}

impl IntoResponse for StubError {
    fn into_response(self) -> Response {
        let status = match &self {
            StubError::Multipart(e) => e.status(),
            StubError::MissingField(_) | StubError::NotAnImage(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[derive(Serialize, Deserialize)]
pub struct Prediction {
    pub prediction: String,
}

pub fn router(state: StubState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(healthcheck))
        .with_state(state)
}

async fn healthcheck() -> impl IntoResponse {
    Json(json!({ "status": "Available" }))
}

async fn read_request(multipart: &mut Multipart) -> Result<ReceivedRequest, StubError> {
    let mut request = ReceivedRequest::default();
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                request.file_name = field.file_name().map(str::to_string);
                request.content_type = field.content_type().map(str::to_string);
                request.file = field.bytes().await?.to_vec();
                has_file = true;
            }
            Some("source") => {
                request.source = Some(field.text().await?);
            }
            _ => {}
        }
    }

    if !has_file {
        return Err(StubError::MissingField("file"));
    }
    if request.source.is_none() {
        return Err(StubError::MissingField("source"));
    }
    Ok(request)
}

#[instrument(skip(state, multipart))]
async fn predict(
    State(state): State<StubState>,
    mut multipart: Multipart,
) -> Result<Response, StubError> {
    state.requests.fetch_add(1, Ordering::SeqCst);

    let request = read_request(&mut multipart).await?;
    let image = image::load_from_memory(&request.file)
        .map_err(|e| StubError::NotAnImage(e.to_string()))?;
    tracing::info!(
        source = request.source.as_deref().unwrap_or_default(),
        width = image.width(),
        height = image.height(),
        "Received gesture snapshot"
    );
    *state.last_request.lock() = Some(request);

    let behavior = state.behavior.lock().clone();
    let response = match behavior {
        StubBehavior::Fixed(prediction) => Json(Prediction { prediction }).into_response(),
        StubBehavior::Random => {
            let label = GESTURE_LABELS
                .choose(&mut rand::rng())
                .copied()
                .unwrap_or("okay");
            Json(Prediction {
                prediction: label.to_string(),
            })
            .into_response()
        }
        StubBehavior::Fail(status) => {
            (status, Json(json!({ "detail": "model unavailable" }))).into_response()
        }
        StubBehavior::MissingPrediction => Json(json!({ "label": "okay" })).into_response(),
        StubBehavior::Slow(prediction, delay) => {
            tokio::time::sleep(delay).await;
            Json(Prediction { prediction }).into_response()
        }
    };

    Ok(response)
}
