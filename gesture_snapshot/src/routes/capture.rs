use super::{page_response, session_from_headers, with_session_cookie};
use crate::image_utils::CapturedImage;
use crate::page::{Notice, INVALID_IMAGE_MESSAGE, SESSION_EXPIRED_MESSAGE};
use crate::server::SharedState;
use crate::session::SessionId;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::instrument;

const IMAGE_FIELD: &str = "image";

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Malformed multipart upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Upload has no `image` part")]
    MissingImage,
    #[error("Image decoding task failed: {0}")]
    Decode(#[from] JoinError),
}

impl IntoResponse for CaptureError {
    fn into_response(self) -> Response {
        let status = match &self {
            CaptureError::Multipart(e) => e.status(),
            CaptureError::MissingImage => StatusCode::BAD_REQUEST,
            CaptureError::Decode(e) => {
                tracing::error!("Image decoding task failed: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Bytes, CaptureError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            return Ok(field.bytes().await?);
        }
    }
    Err(CaptureError::MissingImage)
}

#[instrument(skip(state, headers, multipart))]
pub async fn capture(
    State(state): State<SharedState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, CaptureError> {
    state.metrics.record_request("capture");

    let (id, created) = state.sessions.resolve(session_from_headers(&headers));
    let raw_image = read_image_field(&mut multipart).await?;
    tracing::debug!("Received capture of {} bytes", raw_image.len());

    // Decoding is CPU bound and must stay outside the session lock.
    let decoded =
        tokio::task::spawn_blocking(move || CapturedImage::from_bytes(&raw_image)).await?;

    let image = match decoded {
        Ok(image) => Arc::new(image),
        Err(e) => {
            tracing::warn!(session = %id, "Rejected capture: {}", e);
            return Ok(page_response(
                &state,
                &id,
                created,
                StatusCode::UNPROCESSABLE_ENTITY,
                Some(Notice::Error(INVALID_IMAGE_MESSAGE)),
            ));
        }
    };

    Ok(store_capture(&state, &id, created, image))
}

fn store_capture(
    state: &SharedState,
    id: &SessionId,
    created: bool,
    image: Arc<CapturedImage>,
) -> Response {
    let stored = state
        .sessions
        .with_session(id, |session| session.on_capture(image));

    match stored {
        Some(()) => with_session_cookie(Redirect::to("/").into_response(), id, created),
        None => {
            tracing::warn!(session = %id, "Session expired before the capture was stored");
            page_response(
                state,
                id,
                created,
                StatusCode::GONE,
                Some(Notice::Error(SESSION_EXPIRED_MESSAGE)),
            )
        }
    }
}

/// Serves the session's current snapshot as JPEG.
#[instrument(skip(state, headers))]
pub async fn captured_image(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let Some(id) = session_from_headers(&headers) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    // Only the Arc is cloned under the lock.
    let image = state
        .sessions
        .with_session(&id, |session| session.captured_image().map(Arc::clone))
        .flatten();
    let Some(image) = image else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match image.to_jpg() {
        Ok(jpg) => (
            [
                (header::CONTENT_TYPE, "image/jpeg"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            jpg,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode captured image: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::tests::png_bytes;
    use crate::routes::tests::test_state;
    use axum::body::to_bytes;

    fn image() -> Arc<CapturedImage> {
        Arc::new(CapturedImage::from_bytes(&png_bytes(4, 4, [1, 2, 3])).unwrap())
    }

    #[tokio::test]
    async fn test_capture_for_live_session_redirects() {
        let state = test_state();
        let (id, _) = state.sessions.resolve(None);

        let response = store_capture(&state, &id, false, image());

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            state.sessions.with_session(&id, |s| s.capture_version()),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_capture_for_vanished_session_is_reported() {
        let state = test_state();
        let id = SessionId::generate();

        let response = store_capture(&state, &id, false, image());

        assert_eq!(response.status(), StatusCode::GONE);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains(SESSION_EXPIRED_MESSAGE));
        assert!(state.sessions.is_empty());
    }
}
