use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};

use crate::shared::constants::{DEFAULT_SURFACE_HEIGHT, DEFAULT_SURFACE_WIDTH};
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// The drawing surface frames are captured into and annotated on.
///
/// Resizing clears the surface; every capture overwrites it completely
/// before anything is drawn on top.
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = resolve_dimensions(width, height);
        Self {
            image: RgbImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Resizes the surface. A zero dimension falls back to the default size
    /// for that axis. Returns whether the size changed.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let target = resolve_dimensions(width, height);
        if target == self.dimensions() {
            return false;
        }
        self.image = RgbImage::new(target.0, target.1);
        true
    }

    /// Draws `frame` over the whole surface, scaling when sizes differ.
    pub fn draw_frame(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let source = frame
            .to_rgb_image()
            .ok_or("Frame data does not match its dimensions")?;
        self.image = if source.dimensions() == self.dimensions() {
            source
        } else {
            image::imageops::resize(&source, self.width(), self.height(), FilterType::Triangle)
        };
        Ok(())
    }

    /// Outlines `rect` with a band `line_width` pixels wide centred on the
    /// rectangle's edges. Parts outside the surface are clipped.
    pub fn stroke_rect(&mut self, rect: &FaceBox, color: [u8; 3], line_width: u32) {
        if line_width == 0 {
            return;
        }
        let edges = [rect.x, rect.y, rect.x + rect.w, rect.y + rect.h];
        if edges.iter().any(|v| !v.is_finite()) {
            log::warn!("Skipping face box with non-finite coordinates: {rect:?}");
            return;
        }
        let half = (line_width / 2) as i64;
        let lw = line_width as i64;

        // Edges further out than one band width draw nothing, so clamping
        // there keeps the arithmetic below in range.
        let margin = f64::from(line_width) + 1.0;
        let clamp_x = |v: f64| v.round().clamp(-margin, f64::from(self.width()) + margin) as i64;
        let clamp_y = |v: f64| v.round().clamp(-margin, f64::from(self.height()) + margin) as i64;
        let left = clamp_x(edges[0]);
        let top = clamp_y(edges[1]);
        let right = clamp_x(edges[2]);
        let bottom = clamp_y(edges[3]);

        let outer_left = left - half;
        let outer_right = right - half + lw - 1;

        // Top and bottom bands span the full outer width.
        self.fill(outer_left, top - half, outer_right, top - half + lw - 1, color);
        self.fill(outer_left, bottom - half, outer_right, bottom - half + lw - 1, color);
        // Left and right bands.
        self.fill(left - half, top - half, left - half + lw - 1, bottom - half + lw - 1, color);
        self.fill(right - half, top - half, outer_right, bottom - half + lw - 1, color);
    }

    /// Fills the inclusive pixel range `[x0, x1] x [y0, y1]`, clipped.
    fn fill(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 3]) {
        let max_x = self.width() as i64 - 1;
        let max_y = self.height() as i64 - 1;
        let (x0, x1) = (x0.max(0), x1.min(max_x));
        let (y0, y1) = (y0.max(0), y1.min(max_y));
        if x0 > x1 || y0 > y1 {
            return;
        }
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.image.put_pixel(x as u32, y as u32, Rgb(color));
            }
        }
    }

    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&self.image)?;
        Ok(buf)
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    /// Copy of the current surface contents.
    pub fn snapshot(&self, index: usize) -> Frame {
        Frame::from_rgb_image(self.image.clone(), index)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(DEFAULT_SURFACE_WIDTH, DEFAULT_SURFACE_HEIGHT)
    }
}

fn resolve_dimensions(width: u32, height: u32) -> (u32, u32) {
    (
        if width == 0 { DEFAULT_SURFACE_WIDTH } else { width },
        if height == 0 { DEFAULT_SURFACE_HEIGHT } else { height },
    )
}
