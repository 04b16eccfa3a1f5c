use crate::detection::domain::detection_client::{DetectionError, DetectionResult};
use crate::rendering::canvas::Canvas;
use crate::rendering::status::StatusLabel;
use crate::shared::constants::{BOX_COLOR, BOX_LINE_WIDTH, DEFAULT_JPEG_QUALITY};
use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;

/// Lifecycle of one capture session.
///
/// `Idle → StreamReady → Polling ⇄ Requesting`. `Requesting` doubles as the
/// in-flight flag: while in it, ticks are skipped rather than queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    StreamReady,
    Polling,
    Requesting,
}

/// A captured frame ready to be sent to the detection service.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSubmission {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub frame_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotReady,
    InFlight,
    NoFrame,
    CaptureFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Submit(FrameSubmission),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The surface was redrawn with the returned boxes.
    Applied { status_changed: bool },
    /// The request failed; status and surface are untouched.
    Failed,
    /// No request was in flight.
    Ignored,
}

/// The capture and overlay state machine.
///
/// Owns the drawing surface and status label. It performs no I/O and never
/// blocks: the caller feeds it stream events, ticks and detection results,
/// and carries out the submissions it returns.
pub struct CaptureLoop {
    state: SessionState,
    canvas: Canvas,
    status: StatusLabel,
    jpeg_quality: u8,
}

impl CaptureLoop {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            state: SessionState::Idle,
            canvas: Canvas::default(),
            status: StatusLabel::default(),
            jpeg_quality,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &StatusLabel {
        &self.status
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// True once the first frame has been seen; the polling timer runs from here on.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Polling | SessionState::Requesting)
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == SessionState::Requesting
    }

    pub fn on_stream_acquired(&mut self, info: &StreamInfo) -> bool {
        if self.state != SessionState::Idle {
            log::warn!("Stream {} acquired twice; ignoring", info.name);
            return false;
        }
        log::info!("Camera stream ready: {}", info.name);
        self.state = SessionState::StreamReady;
        true
    }

    /// Camera access failed. The session stays idle with its initial status.
    pub fn on_stream_denied(&mut self, reason: &str) {
        log::error!("Error accessing webcam: {reason}");
    }

    /// Sizes the surface to the video's native resolution and starts polling.
    /// Only the first call has an effect.
    pub fn on_first_frame_ready(&mut self, width: u32, height: u32) -> bool {
        if self.state != SessionState::StreamReady {
            return false;
        }
        self.canvas.resize(width, height);
        let (w, h) = self.canvas.dimensions();
        log::info!("First frame decoded; surface is {w}x{h}");
        self.state = SessionState::Polling;
        true
    }

    /// One timer tick: capture `frame` into the surface and hand back the
    /// encoded submission, unless a request is already in flight.
    pub fn tick(&mut self, frame: Option<&Frame>) -> TickOutcome {
        match self.state {
            SessionState::Idle | SessionState::StreamReady => {
                return TickOutcome::Skipped(SkipReason::NotReady)
            }
            SessionState::Requesting => {
                log::debug!("Skipping tick: detection request in flight");
                return TickOutcome::Skipped(SkipReason::InFlight);
            }
            SessionState::Polling => {}
        }

        let Some(frame) = frame else {
            return TickOutcome::Skipped(SkipReason::NoFrame);
        };

        let (width, height) = frame.dimensions();
        if self.canvas.resize(width, height) {
            let (w, h) = self.canvas.dimensions();
            log::info!("Video resolution changed; surface is now {w}x{h}");
        }

        if let Err(e) = self.canvas.draw_frame(frame) {
            log::error!("Failed to capture frame {}: {e}", frame.index());
            return TickOutcome::Skipped(SkipReason::CaptureFailed);
        }

        let jpeg = match self.canvas.encode_jpeg(self.jpeg_quality) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                log::error!("{}", DetectionError::Encode(e));
                return TickOutcome::Skipped(SkipReason::CaptureFailed);
            }
        };

        self.state = SessionState::Requesting;
        let (width, height) = self.canvas.dimensions();
        TickOutcome::Submit(FrameSubmission {
            jpeg,
            width,
            height,
            frame_index: frame.index(),
        })
    }

    /// Applies the outcome of the in-flight request and clears the flag.
    ///
    /// On success the current video frame is redrawn to erase the previous
    /// overlay and the returned boxes are stroked in surface coordinates,
    /// without rescaling.
    pub fn on_detection_complete(
        &mut self,
        result: Result<DetectionResult, DetectionError>,
        current: Option<&Frame>,
    ) -> Completion {
        if self.state != SessionState::Requesting {
            log::warn!("Ignoring detection result with no request in flight");
            return Completion::Ignored;
        }
        self.state = SessionState::Polling;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                log::error!("Error sending frame: {e}");
                return Completion::Failed;
            }
        };

        let status_changed = self.status.as_str() != result.mask_status;
        self.status = StatusLabel::new(result.mask_status);

        if let Some(frame) = current {
            if frame.dimensions() != self.canvas.dimensions() {
                log::warn!(
                    "Video is {}x{} but boxes refer to a {}x{} capture; drawing unscaled",
                    frame.width(),
                    frame.height(),
                    self.canvas.width(),
                    self.canvas.height()
                );
            }
            if let Err(e) = self.canvas.draw_frame(frame) {
                log::error!("Failed to redraw frame {}: {e}", frame.index());
            }
        }

        for face in &result.faces {
            self.canvas.stroke_rect(face, BOX_COLOR, BOX_LINE_WIDTH);
        }
        log::debug!("{} with {} face(s)", self.status, result.faces.len());

        Completion::Applied { status_changed }
    }
}

impl Default for CaptureLoop {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}
