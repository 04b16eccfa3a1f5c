pub const DEFAULT_ENDPOINT: &str = "https://face-mask-detector-j0f6.onrender.com";
pub const DETECT_PATH: &str = "detect";

/// Multipart field and file name the detection service reads the frame from.
pub const IMAGE_FIELD: &str = "image";
pub const FRAME_FILE_NAME: &str = "frame.jpg";

pub const CAPTURE_INTERVAL_MS: u64 = 500;
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Matches the quality browsers use when encoding a canvas as JPEG.
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

pub const DEFAULT_SURFACE_WIDTH: u32 = 640;
pub const DEFAULT_SURFACE_HEIGHT: u32 = 480;

pub const INITIAL_STATUS: &str = "Detecting...";
pub const MASK_STATUS: &str = "Mask";

pub const BOX_LINE_WIDTH: u32 = 3;
pub const BOX_COLOR: [u8; 3] = [255, 0, 0];

pub const STATUS_GREEN: [u8; 3] = [0, 128, 0];
pub const STATUS_RED: [u8; 3] = [255, 0, 0];

/// Pacing for sources that are not real-time devices and report no frame rate.
pub const FALLBACK_FPS: f64 = 30.0;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
