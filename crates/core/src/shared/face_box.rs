use serde::Deserialize;

/// A face rectangle in pixel coordinates of the frame that was submitted.
///
/// The service sends integers, but floats are accepted too.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl FaceBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}
