/// What is known about a camera stream once it has been opened.
///
/// `width`/`height` are the decoder's advertised size and may be zero until
/// the first frame arrives; the first decoded frame is authoritative.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// True for capture devices that deliver frames in real time. File and
    /// still-image sources are paced by the feed instead.
    pub live: bool,
}
