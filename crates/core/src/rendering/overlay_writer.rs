use std::fs;
use std::path::Path;

use image::ImageFormat;

use crate::shared::frame::Frame;

/// Writes the annotated surface to an image file.
///
/// The file is replaced atomically so a viewer polling it never sees a
/// half-written image.
pub struct OverlayWriter;

impl OverlayWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let format = ImageFormat::from_path(path)?;
        let img = frame
            .to_rgb_image()
            .ok_or("Failed to create image from frame data")?;

        let temp_path = path.with_extension("part");
        img.save_with_format(&temp_path, format)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

impl Default for OverlayWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Frame::new(data, width, height, 0)
    }

    #[test]
    fn test_write_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("overlay.png");
        OverlayWriter::new()
            .write(&path, &make_frame(20, 10, [50, 100, 200]))
            .unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("part").exists());
    }

    #[test]
    fn test_roundtrip_preserves_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        OverlayWriter::new()
            .write(&path, &make_frame(30, 20, [50, 100, 200]))
            .unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (30, 20));
        assert_eq!(img.get_pixel(0, 0).0, [50, 100, 200]);
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        let writer = OverlayWriter::new();
        writer.write(&path, &make_frame(10, 10, [0, 0, 0])).unwrap();
        writer.write(&path, &make_frame(12, 8, [255, 0, 0])).unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (12, 8));
    }

    #[test]
    fn test_unknown_extension_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.unknown");
        assert!(OverlayWriter::new()
            .write(&path, &make_frame(4, 4, [0, 0, 0]))
            .is_err());
    }
}
