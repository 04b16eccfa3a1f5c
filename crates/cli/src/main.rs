use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{select, Receiver};

use maskwatch_core::capture::infrastructure::source_factory::{self, is_image};
use maskwatch_core::detection::infrastructure::http_detection_client::HttpDetectionClient;
use maskwatch_core::rendering::overlay_writer::OverlayWriter;
use maskwatch_core::rendering::status::{with_status_strip, StatusLabel};
use maskwatch_core::session::capture_session::{
    self, SessionConfig, SessionEvent, SessionParams,
};
use maskwatch_core::shared::constants::{
    CAPTURE_INTERVAL_MS, DEFAULT_ENDPOINT, DEFAULT_JPEG_QUALITY, IMAGE_EXTENSIONS,
    REQUEST_TIMEOUT_SECS,
};

const STATUS_STRIP_HEIGHT: u32 = 24;

/// Streams webcam frames to a face-mask detection service and reports the verdict.
#[derive(Parser)]
#[command(name = "maskwatch")]
struct Cli {
    /// Base URL of the detection service (frames go to `{endpoint}/detect`).
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Capture device, e.g. /dev/video0 (platform default if omitted).
    #[arg(long)]
    device: Option<String>,

    /// libavdevice input format for --device, e.g. v4l2, avfoundation, dshow.
    #[arg(long)]
    input_format: Option<String>,

    /// Read frames from an image or video file instead of a camera.
    #[arg(long, conflicts_with_all = ["device", "input_format"])]
    input: Option<PathBuf>,

    /// Milliseconds between capture attempts.
    #[arg(long, default_value_t = CAPTURE_INTERVAL_MS)]
    interval_ms: u64,

    /// HTTP request timeout in seconds.
    #[arg(long, default_value_t = REQUEST_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// JPEG quality of uploaded frames (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    jpeg_quality: u8,

    /// Keep the latest annotated frame, with a status strip, in this image file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    duration_secs: Option<u64>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let source = source_factory::create_source(source_factory::resolve(
        cli.input.as_deref(),
        cli.input_format.as_deref(),
        cli.device.as_deref(),
    ));
    let client = HttpDetectionClient::new(&cli.endpoint, Duration::from_secs(cli.timeout_secs))?;
    log::info!("Posting frames to {}", client.url());

    let config = SessionConfig {
        interval: Duration::from_millis(cli.interval_ms),
        jpeg_quality: cli.jpeg_quality,
    };
    let (events, handle) = capture_session::spawn(SessionParams {
        source,
        client: Box::new(client),
        config,
    });

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;

    let deadline = match cli.duration_secs {
        Some(secs) => crossbeam_channel::after(Duration::from_secs(secs)),
        None => crossbeam_channel::never(),
    };

    let result = watch(&events, &stop_rx, &deadline, cli.output.as_deref());
    handle.shutdown();
    log::info!("Camera released");
    result
}

/// Reports session events until a stop signal arrives or the stream is denied.
fn watch(
    events: &Receiver<SessionEvent>,
    stop: &Receiver<()>,
    deadline: &Receiver<std::time::Instant>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let writer = OverlayWriter::new();
    let mut status = StatusLabel::default();
    log::info!("{status}");

    loop {
        select! {
            recv(stop) -> _ => {
                log::info!("Interrupted, stopping capture");
                return Ok(());
            }
            recv(deadline) -> _ => {
                log::info!("Duration elapsed, stopping capture");
                return Ok(());
            }
            recv(events) -> event => {
                let Ok(event) = event else {
                    return Err("capture session stopped unexpectedly".into());
                };
                match event {
                    SessionEvent::StateChanged(state) => log::debug!("Session state: {state:?}"),
                    SessionEvent::StatusChanged(label) => {
                        log::info!("{label}");
                        status = label;
                    }
                    SessionEvent::FrameRendered(frame) => {
                        if let Some(path) = output {
                            let annotated = with_status_strip(&frame, &status, STATUS_STRIP_HEIGHT);
                            if let Err(e) = writer.write(path, &annotated) {
                                log::error!("Failed to write {}: {e}", path.display());
                            }
                        }
                    }
                    SessionEvent::StreamDenied(reason) => {
                        return Err(format!("Camera unavailable: {reason}").into());
                    }
                    SessionEvent::StreamEnded => {
                        log::info!("Input ended; keeping the last frame");
                    }
                    SessionEvent::RequestFailed(message) => {
                        log::warn!("Detection request failed: {message}");
                    }
                }
            }
        }
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(input) = &cli.input {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
    }
    if !cli.endpoint.starts_with("http://") && !cli.endpoint.starts_with("https://") {
        return Err(format!(
            "Endpoint must be an http:// or https:// URL, got '{}'",
            cli.endpoint
        )
        .into());
    }
    if cli.interval_ms == 0 {
        return Err("Interval must be at least 1 ms".into());
    }
    if cli.timeout_secs == 0 {
        return Err("Timeout must be at least 1 second".into());
    }
    if !(1..=100).contains(&cli.jpeg_quality) {
        return Err(format!(
            "JPEG quality must be between 1 and 100, got {}",
            cli.jpeg_quality
        )
        .into());
    }
    if let Some(output) = &cli.output {
        if !is_image(output) {
            return Err(format!(
                "Output must be an image file ({}), got {}",
                IMAGE_EXTENSIONS.join(", "),
                output.display()
            )
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["maskwatch"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cli.interval_ms, 500);
        assert_eq!(cli.timeout_secs, 30);
        assert_eq!(cli.jpeg_quality, 92);
        assert!(validate(&cli).is_ok());
    }

    #[test]
    fn test_input_conflicts_with_device() {
        let result =
            Cli::try_parse_from(["maskwatch", "--input", "a.png", "--device", "/dev/video1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(validate(&parse(&["--interval-ms", "0"])).is_err());
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        assert!(validate(&parse(&["--endpoint", "localhost:5000"])).is_err());
    }

    #[test]
    fn test_rejects_non_image_output() {
        assert!(validate(&parse(&["--output", "overlay.mp4"])).is_err());
        assert!(validate(&parse(&["--output", "overlay.png"])).is_ok());
    }

    #[test]
    fn test_rejects_missing_input() {
        assert!(validate(&parse(&["--input", "/nonexistent/clip.mp4"])).is_err());
    }
}
