use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;

/// A camera-like producer of frames.
///
/// `open` is the permission/acquisition step: it either yields a live stream
/// or fails (device missing, access denied). Implementations own whatever
/// handle backs the stream and must release it in `close`.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<StreamInfo, Box<dyn std::error::Error>>;

    /// Frames in capture order. Live sources never end on their own.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    fn close(&mut self);
}
