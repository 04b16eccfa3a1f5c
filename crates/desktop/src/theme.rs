use iced::color;
use iced::theme::Palette;
use iced::{Color, Theme};

use maskwatch_core::rendering::status::StatusColor;

pub fn resolve_theme() -> Theme {
    Theme::custom("MaskWatch", dark_palette())
}

fn dark_palette() -> Palette {
    Palette {
        background: color!(0x11, 0x11, 0x11),
        text: color!(0xff, 0xff, 0xff),
        primary: color!(0x5e, 0x9f, 0xf5),
        success: color!(0x00, 0x80, 0x00),
        warning: color!(0xff, 0xcc, 0x00),
        danger: color!(0xff, 0x00, 0x00),
    }
}

/// Background of the status box.
pub fn status_background(color: StatusColor) -> Color {
    let [r, g, b] = color.rgb();
    Color::from_rgb8(r, g, b)
}
