pub mod canvas;
pub mod overlay_writer;
pub mod status;
