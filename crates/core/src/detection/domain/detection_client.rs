use thiserror::Error;

use crate::shared::face_box::FaceBox;

/// What the detection service said about one submitted frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub mask_status: String,
    pub faces: Vec<FaceBox>,
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("failed to encode frame: {0}")]
    Encode(#[source] image::ImageError),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("detection service returned HTTP {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("detection service error: {0}")]
    Service(String),
    #[error("response is missing {0}")]
    Malformed(&'static str),
    #[error("detection worker stopped")]
    Disconnected,
}

/// Sends one JPEG-encoded frame to a detection backend.
///
/// Calls block until the backend answers or fails.
pub trait DetectionClient: Send {
    fn detect(&self, jpeg: Vec<u8>) -> Result<DetectionResult, DetectionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            DetectionError::Status(502).to_string(),
            "detection service returned HTTP 502"
        );
        assert_eq!(
            DetectionError::Service("boom".to_string()).to_string(),
            "detection service error: boom"
        );
        assert_eq!(
            DetectionError::Malformed("mask_status").to_string(),
            "response is missing mask_status"
        );
    }
}
