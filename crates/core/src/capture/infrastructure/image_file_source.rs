use std::path::{Path, PathBuf};

use crate::capture::domain::frame_source::FrameSource;
use crate::shared::constants::FALLBACK_FPS;
use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;

/// Presents a single still image as an endless stream of identical frames.
///
/// Handy for pointing the loop at a known picture without a camera attached.
pub struct ImageFileSource {
    path: PathBuf,
    frame: Option<Frame>,
}

impl ImageFileSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            frame: None,
        }
    }
}

impl FrameSource for ImageFileSource {
    fn open(&mut self) -> Result<StreamInfo, Box<dyn std::error::Error>> {
        let image = image::open(&self.path)?.to_rgb8();
        let frame = Frame::from_rgb_image(image, 0);
        let info = StreamInfo {
            name: self.path.display().to_string(),
            width: frame.width(),
            height: frame.height(),
            fps: FALLBACK_FPS,
            live: false,
        };
        self.frame = Some(frame);
        Ok(info)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(frame) = self.frame.as_ref() else {
            return Box::new(std::iter::once(Err("ImageFileSource: not opened".into())));
        };
        Box::new((0..).map(move |index| {
            Ok(Frame::new(
                frame.data().to_vec(),
                frame.width(),
                frame.height(),
                index,
            ))
        }))
    }

    fn close(&mut self) {
        self.frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_image(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("face.png");
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_open_returns_image_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 100, 80);
        let mut source = ImageFileSource::new(&path);
        let info = source.open().unwrap();
        assert_eq!((info.width, info.height), (100, 80));
        assert_eq!(info.fps, FALLBACK_FPS);
        assert!(!info.live);
    }

    #[test]
    fn test_frames_repeat_with_increasing_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 10, 10);
        let mut source = ImageFileSource::new(&path);
        source.open().unwrap();

        let frames: Vec<Frame> = source.frames().take(3).map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].index(), 2);
        assert_eq!(frames[0].data(), frames[2].data());
        assert_eq!(frames[1].pixel(5, 5), [50, 100, 200]);
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let mut source = ImageFileSource::new(Path::new("/nonexistent/face.png"));
        assert!(source.open().is_err());
    }

    #[test]
    fn test_frames_after_close_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 10, 10);
        let mut source = ImageFileSource::new(&path);
        source.open().unwrap();
        source.close();
        assert!(source.frames().next().unwrap().is_err());
    }
}
