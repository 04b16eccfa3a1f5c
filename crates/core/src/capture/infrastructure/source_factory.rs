use std::path::{Path, PathBuf};

use crate::capture::domain::frame_source::FrameSource;
use crate::shared::constants::IMAGE_EXTENSIONS;

use super::ffmpeg_source::{default_camera, FfmpegSource, SourceTarget};
use super::image_file_source::ImageFileSource;

/// Which frame source a front end asked for.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceSpec {
    /// A still image, repeated as if it were a camera.
    Image(PathBuf),
    Ffmpeg(SourceTarget),
}

/// Picks a source from front-end options.
///
/// An `input` file wins over device options. Image extensions get the still
/// image source, anything else is handed to ffmpeg. Without an input, the
/// platform camera is used with `input_format`/`device` overriding its parts.
pub fn resolve(input: Option<&Path>, input_format: Option<&str>, device: Option<&str>) -> SourceSpec {
    if let Some(path) = input {
        if is_image(path) {
            return SourceSpec::Image(path.to_path_buf());
        }
        return SourceSpec::Ffmpeg(SourceTarget::Media(path.to_path_buf()));
    }

    let mut target = default_camera();
    if let SourceTarget::Device {
        format: default_format,
        device: default_device,
    } = &mut target
    {
        if let Some(format) = input_format {
            *default_format = format.to_string();
        }
        if let Some(device) = device {
            *default_device = device.to_string();
        }
    }
    SourceSpec::Ffmpeg(target)
}

pub fn create_source(spec: SourceSpec) -> Box<dyn FrameSource> {
    match spec {
        SourceSpec::Image(path) => {
            log::info!("Using still image {}", path.display());
            Box::new(ImageFileSource::new(&path))
        }
        SourceSpec::Ffmpeg(target) => {
            log::info!("Using ffmpeg source {target:?}");
            Box::new(FfmpegSource::new(target))
        }
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
