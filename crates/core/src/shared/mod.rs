pub mod constants;
pub mod face_box;
pub mod frame;
pub mod stream_info;
