//! Live webcam capture with remote face mask detection and on-frame overlay.
//!
//! Frames flow `FrameSource → LiveFeed → CaptureLoop (Canvas) → DetectionClient`
//! and back into the canvas as red face boxes plus a status label.

pub mod capture;
pub mod detection;
pub mod rendering;
pub mod session;
pub mod shared;
