use std::path::{Path, PathBuf};

use crate::capture::domain::frame_source::FrameSource;
use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;

/// Where an [`FfmpegSource`] reads from.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceTarget {
    /// A capture device opened through a libavdevice input format
    /// (`v4l2`, `avfoundation`, `dshow`, ...).
    Device { format: String, device: String },
    /// A media file or stream URL, paced by the feed at its frame rate.
    Media(PathBuf),
}

/// Platform default capture backend and device.
pub fn default_camera() -> SourceTarget {
    #[cfg(target_os = "macos")]
    {
        SourceTarget::Device {
            format: "avfoundation".to_string(),
            device: "0".to_string(),
        }
    }
    #[cfg(target_os = "windows")]
    {
        SourceTarget::Device {
            format: "dshow".to_string(),
            device: "video=Integrated Camera".to_string(),
        }
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        SourceTarget::Device {
            format: "v4l2".to_string(),
            device: "/dev/video0".to_string(),
        }
    }
}

/// Decodes camera or media frames via ffmpeg-next and converts them to RGB24.
pub struct FfmpegSource {
    target: SourceTarget,
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
}

// Safety: FfmpegSource is only used from the feed thread that owns it.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    pub fn new(target: SourceTarget) -> Self {
        Self {
            target,
            input_ctx: None,
            video_stream_index: 0,
        }
    }

    pub fn camera(format: &str, device: &str) -> Self {
        Self::new(SourceTarget::Device {
            format: format.to_string(),
            device: device.to_string(),
        })
    }

    pub fn media(path: &Path) -> Self {
        Self::new(SourceTarget::Media(path.to_path_buf()))
    }

    pub fn target(&self) -> &SourceTarget {
        &self.target
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, Box<dyn std::error::Error>> {
        match &self.target {
            SourceTarget::Device { format, device } => {
                ffmpeg_next::device::register_all();
                let input_format = ffmpeg_next::device::input::video()
                    .find(|f| f.name() == format.as_str())
                    .ok_or_else(|| format!("Capture backend '{format}' is not available"))?;
                let ctx = ffmpeg_next::format::open_with(
                    device,
                    &input_format,
                    ffmpeg_next::Dictionary::new(),
                )?;
                Ok(ctx.input())
            }
            SourceTarget::Media(path) => Ok(ffmpeg_next::format::input(path)?),
        }
    }

    fn name(&self) -> String {
        match &self.target {
            SourceTarget::Device { device, .. } => device.clone(),
            SourceTarget::Media(path) => path.display().to_string(),
        }
    }
}

impl FrameSource for FfmpegSource {
    fn open(&mut self) -> Result<StreamInfo, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = self.open_input()?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let info = StreamInfo {
            name: self.name(),
            width: decoder.width(),
            height: decoder.height(),
            fps,
            live: matches!(self.target, SourceTarget::Device { .. }),
        };

        self.video_stream_index = stream.index();
        self.input_ctx = Some(ictx);
        log::info!(
            "Opened {} ({}x{} @ {:.1} fps)",
            info.name,
            info.width,
            info.height,
            info.fps
        );
        Ok(info)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(ictx) = self.input_ctx.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegSource: not opened".into())));
        };

        let decoder = match open_decoder(ictx, self.video_stream_index) {
            Ok(decoder) => decoder,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };

        Box::new(FfmpegFrameIter {
            ictx,
            decoder,
            scaler: None,
            video_stream_index: self.video_stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn close(&mut self) {
        if self.input_ctx.take().is_some() {
            log::info!("Released {}", self.name());
        }
    }
}

fn open_decoder(
    ictx: &ffmpeg_next::format::context::Input,
    video_stream_index: usize,
) -> Result<ffmpeg_next::decoder::Video, Box<dyn std::error::Error>> {
    let stream = ictx
        .stream(video_stream_index)
        .ok_or("Video stream disappeared")?;
    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
    Ok(codec_ctx.decoder().video()?)
}

/// RGB converter for one input geometry. Rebuilt when the camera switches
/// resolution mid-stream.
struct Scaler {
    context: ffmpeg_next::software::scaling::Context,
    format: ffmpeg_next::format::Pixel,
    width: u32,
    height: u32,
}

impl Scaler {
    fn matches(&self, decoded: &ffmpeg_next::util::frame::video::Video) -> bool {
        self.format == decoded.format()
            && self.width == decoded.width()
            && self.height == decoded.height()
    }
}

/// Lazy decoder: pulls packets only as frames are requested.
struct FfmpegFrameIter<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: Option<Scaler>,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl FfmpegFrameIter<'_> {
    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }
        Some(self.convert(&decoded))
    }

    fn convert(
        &mut self,
        decoded: &ffmpeg_next::util::frame::video::Video,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        let width = decoded.width();
        let height = decoded.height();

        if !self.scaler.as_ref().is_some_and(|s| s.matches(decoded)) {
            if self.scaler.is_some() {
                log::info!("Camera resolution changed to {width}x{height}");
            }
            let context = ffmpeg_next::software::scaling::Context::get(
                decoded.format(),
                width,
                height,
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )?;
            self.scaler = Some(Scaler {
                context,
                format: decoded.format(),
                width,
                height,
            });
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.context.run(decoded, &mut rgb_frame)?;
        }

        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        let frame = Frame::new(pixels, width, height, self.frame_index);
        self.frame_index += 1;
        Ok(frame)
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Strips per-row stride padding from an RGB24 ffmpeg frame.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_image(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("still.png");
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_open_media_returns_stream_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 64, 48);
        let mut source = FfmpegSource::media(&path);
        let info = source.open().unwrap();
        assert_eq!(info.width, 64);
        assert_eq!(info.height, 48);
        assert!(!info.live);
        assert_eq!(info.name, path.display().to_string());
    }

    #[test]
    fn test_media_frames_are_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 64, 48);
        let mut source = FfmpegSource::media(&path);
        source.open().unwrap();

        let frame = source.frames().next().unwrap().unwrap();
        assert_eq!(frame.dimensions(), (64, 48));
        assert_eq!(frame.index(), 0);
        assert_eq!(frame.pixel(0, 0), [50, 100, 200]);
    }

    #[test]
    fn test_open_missing_file_fails() {
        let mut source = FfmpegSource::media(Path::new("/nonexistent/clip.mp4"));
        assert!(source.open().is_err());
    }

    #[test]
    fn test_unknown_capture_backend_fails() {
        let mut source = FfmpegSource::camera("no-such-backend", "/dev/video0");
        let err = source.open().unwrap_err();
        assert!(err.to_string().contains("no-such-backend"));
    }

    #[test]
    fn test_missing_camera_device_fails() {
        let SourceTarget::Device { format, .. } = default_camera() else {
            unreachable!();
        };
        let mut source = FfmpegSource::camera(&format, "/nonexistent/video99");
        assert!(source.open().is_err());
        source.close();
    }

    #[test]
    fn test_frames_without_open_returns_error() {
        let mut source = FfmpegSource::media(Path::new("unused.mp4"));
        let result = source.frames().next().unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 16, 16);
        let mut source = FfmpegSource::media(&path);
        source.open().unwrap();
        source.close();
        source.close();
    }

    #[test]
    fn test_default_camera_is_a_device() {
        assert!(matches!(default_camera(), SourceTarget::Device { .. }));
    }
}
