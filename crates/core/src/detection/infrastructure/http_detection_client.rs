use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;

use crate::detection::domain::detection_client::{DetectionClient, DetectionError, DetectionResult};
use crate::shared::constants::{DETECT_PATH, FRAME_FILE_NAME, IMAGE_FIELD, REQUEST_TIMEOUT_SECS};
use crate::shared::face_box::FaceBox;

/// Response body of `POST /detect`. The service answers `{"error": ...}`
/// instead when it fails internally, still with a success status.
#[derive(Deserialize)]
struct DetectResponse {
    mask_status: Option<String>,
    faces: Option<Vec<FaceBox>>,
    error: Option<String>,
}

/// Posts frames as `multipart/form-data` to `{base}/detect`.
pub struct HttpDetectionClient {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpDetectionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DetectionError> {
        let url = detect_url(base_url);
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DetectionError::Transport {
                url: url.clone(),
                source: e,
            })?;
        Ok(Self { client, url })
    }

    pub fn with_default_timeout(base_url: &str) -> Result<Self, DetectionError> {
        Self::new(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport(&self, source: reqwest::Error) -> DetectionError {
        DetectionError::Transport {
            url: self.url.clone(),
            source,
        }
    }
}

impl DetectionClient for HttpDetectionClient {
    fn detect(&self, jpeg: Vec<u8>) -> Result<DetectionResult, DetectionError> {
        let part = Part::bytes(jpeg)
            .file_name(FRAME_FILE_NAME)
            .mime_str("image/jpeg")
            .map_err(|e| self.transport(e))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .map_err(|e| self.transport(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DetectionError::Status(status.as_u16()));
        }

        let body = response.bytes().map_err(|e| self.transport(e))?;
        parse_response(&body)
    }
}

fn detect_url(base_url: &str) -> String {
    format!("{}/{DETECT_PATH}", base_url.trim_end_matches('/'))
}

fn parse_response(body: &[u8]) -> Result<DetectionResult, DetectionError> {
    let parsed: DetectResponse = serde_json::from_slice(body).map_err(DetectionError::Decode)?;
    if let Some(error) = parsed.error {
        return Err(DetectionError::Service(error));
    }
    let mask_status = parsed
        .mask_status
        .ok_or(DetectionError::Malformed("mask_status"))?;
    Ok(DetectionResult {
        mask_status,
        faces: parsed.faces.unwrap_or_default(),
    })
}
