use crate::config::PredictionServiceConfig;
use crate::image_utils::{CapturedImage, ImageError};
use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::instrument;

const UPLOAD_FILE_NAME: &str = "image.jpg";
const UPLOAD_MIME: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Prediction endpoint answered with status {0}")]
    PredictionFailed(StatusCode),
    #[error("HTTP request to the prediction endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Prediction response is malformed: {0}")]
    MalformedResponse(String),
    #[error("Image encoding failed: {0}")]
    Encode(#[from] ImageError),
}

impl PredictionError {
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::PredictionFailed(_) => "status",
            PredictionError::Transport(_) => "transport",
            PredictionError::MalformedResponse(_) => "malformed",
            PredictionError::Encode(_) => "encode",
        }
    }
}

#[derive(Deserialize)]
struct PredictionBody {
    prediction: String,
}

/// Result of one request cycle, fed back into the session.
#[derive(Debug)]
pub enum PredictionOutcome {
    Label(String),
    Failed(PredictionError),
}

impl PredictionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionOutcome::Label(_) => "success",
            PredictionOutcome::Failed(_) => "failure",
        }
    }
}

impl From<Result<String, PredictionError>> for PredictionOutcome {
    fn from(result: Result<String, PredictionError>) -> Self {
        match result {
            Ok(label) => PredictionOutcome::Label(label),
            Err(e) => PredictionOutcome::Failed(e),
        }
    }
}

pub struct PredictionClient {
    client: Client,
    endpoint: String,
    source: String,
    result_delay: Duration,
}

impl PredictionClient {
    pub fn new(prediction_config: &PredictionServiceConfig) -> Result<Self, PredictionError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: prediction_config.endpoint.clone(),
            source: prediction_config.source.clone(),
            result_delay: Duration::from_millis(prediction_config.result_delay_ms),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends the snapshot as `file` plus the `source` tag and returns the label.
    #[instrument(skip(self, image), fields(endpoint = %self.endpoint))]
    pub async fn predict(&self, image: &CapturedImage) -> Result<String, PredictionError> {
        let image_data = image.to_jpg()?;

        let file = Part::bytes(image_data)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(UPLOAD_MIME)?;
        let form = Form::new()
            .part("file", file)
            .text("source", self.source.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await;

        // Pause after the response arrives, whatever it was.
        sleep(self.result_delay).await;

        let response = response?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(PredictionError::PredictionFailed(status));
        }

        let body = response.bytes().await?;
        let body: PredictionBody = serde_json::from_slice(&body)
            .map_err(|e| PredictionError::MalformedResponse(e.to_string()))?;

        tracing::debug!("Received prediction `{}`", body.prediction);
        Ok(body.prediction)
    }
}
