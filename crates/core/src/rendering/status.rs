use std::fmt;

use crate::shared::constants::{INITIAL_STATUS, MASK_STATUS, STATUS_GREEN, STATUS_RED};
use crate::shared::frame::Frame;

/// Indicator colour behind the status text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Green,
    Red,
}

impl StatusColor {
    pub fn rgb(self) -> [u8; 3] {
        match self {
            StatusColor::Green => STATUS_GREEN,
            StatusColor::Red => STATUS_RED,
        }
    }
}

/// The label reported by the detection service.
///
/// The vocabulary belongs to the service; only `"Mask"` is special-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLabel(String);

impl StatusLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn color(&self) -> StatusColor {
        if self.0 == MASK_STATUS {
            StatusColor::Green
        } else {
            StatusColor::Red
        }
    }
}

impl Default for StatusLabel {
    fn default() -> Self {
        Self::new(INITIAL_STATUS)
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status: {}", self.0)
    }
}

/// Returns `frame` with a solid strip of the status colour appended below it.
pub fn with_status_strip(frame: &Frame, status: &StatusLabel, strip_height: u32) -> Frame {
    let color = status.color().rgb();
    let strip_len = (frame.width() as usize) * (strip_height as usize) * 3;

    let mut data = Vec::with_capacity(frame.data().len() + strip_len);
    data.extend_from_slice(frame.data());
    data.extend(color.iter().copied().cycle().take(strip_len));

    Frame::new(
        data,
        frame.width(),
        frame.height() + strip_height,
        frame.index(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_is_detecting() {
        assert_eq!(StatusLabel::default().as_str(), "Detecting...");
    }

    #[rstest]
    #[case("Mask", StatusColor::Green)]
    #[case("No Mask", StatusColor::Red)]
    #[case("Detecting...", StatusColor::Red)]
    #[case("mask", StatusColor::Red)]
    #[case("", StatusColor::Red)]
    fn test_only_mask_is_green(#[case] label: &str, #[case] expected: StatusColor) {
        assert_eq!(StatusLabel::new(label).color(), expected);
    }

    #[test]
    fn test_display_prefixes_status() {
        assert_eq!(StatusLabel::new("No Mask").to_string(), "Status: No Mask");
    }

    #[test]
    fn test_status_strip_appends_colored_rows() {
        let frame = Frame::new(vec![7u8; 4 * 2 * 3], 4, 2, 9);
        let out = with_status_strip(&frame, &StatusLabel::new("Mask"), 3);

        assert_eq!(out.dimensions(), (4, 5));
        assert_eq!(out.index(), 9);
        assert_eq!(out.pixel(3, 1), [7, 7, 7]);
        assert_eq!(out.pixel(0, 2), STATUS_GREEN);
        assert_eq!(out.pixel(3, 4), STATUS_GREEN);
    }

    #[test]
    fn test_status_strip_red_for_other_labels() {
        let frame = Frame::new(vec![0u8; 2 * 2 * 3], 2, 2, 0);
        let out = with_status_strip(&frame, &StatusLabel::new("No Mask"), 1);
        assert_eq!(out.pixel(1, 2), STATUS_RED);
    }
}
