use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::capture::domain::frame_source::FrameSource;
use crate::capture::live_feed::{FeedEvent, LiveFeed};
use crate::detection::domain::detection_client::{DetectionClient, DetectionError, DetectionResult};
use crate::rendering::status::StatusLabel;
use crate::session::capture_loop::{CaptureLoop, Completion, FrameSubmission, SessionState, TickOutcome};
use crate::shared::constants::{CAPTURE_INTERVAL_MS, DEFAULT_JPEG_QUALITY};
use crate::shared::frame::Frame;

type DetectionOutcome = Result<DetectionResult, DetectionError>;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Fixed capture period. Ticks that land while a request is in flight are dropped.
    pub interval: Duration,
    pub jpeg_quality: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(CAPTURE_INTERVAL_MS),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// What a front end needs to render the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// The surface changed: a new capture, or a redraw with face boxes.
    FrameRendered(Frame),
    StatusChanged(StatusLabel),
    StreamDenied(String),
    StreamEnded,
    RequestFailed(String),
}

pub struct SessionParams {
    pub source: Box<dyn FrameSource>,
    pub client: Box<dyn DetectionClient>,
    pub config: SessionConfig,
}

/// Owns a running session. Dropping it ends the session: the camera is
/// released and any in-flight detection result is discarded.
pub struct SessionHandle {
    shutdown_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SessionHandle {
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Dropping the sender wakes the session thread's select.
        self.shutdown_tx.take();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("Capture session thread panicked");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts the capture and overlay loop on its own thread.
///
/// Layout: `feed thread → session thread [CaptureLoop] ⇄ detection worker`.
/// All loop state lives on the session thread; the other two only exchange
/// messages with it.
pub fn spawn(params: SessionParams) -> (Receiver<SessionEvent>, SessionHandle) {
    let (event_tx, event_rx) = crossbeam_channel::unbounded::<SessionEvent>();
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

    let thread = thread::spawn(move || run_session(params, &event_tx, &shutdown_rx));

    (
        event_rx,
        SessionHandle {
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        },
    )
}

fn run_session(params: SessionParams, events: &Sender<SessionEvent>, shutdown: &Receiver<()>) {
    let SessionParams {
        source,
        client,
        config,
    } = params;

    let (feed_tx, mut feed_rx) = crossbeam_channel::unbounded::<FeedEvent>();
    let feed = LiveFeed::start(source, feed_tx);

    let (request_tx, request_rx) = crossbeam_channel::bounded::<FrameSubmission>(1);
    let (response_tx, mut response_rx) = crossbeam_channel::bounded::<DetectionOutcome>(1);
    let cancelled = Arc::new(AtomicBool::new(false));
    spawn_detection_worker(client, request_rx, response_tx, cancelled.clone());

    let mut capture = CaptureLoop::new(config.jpeg_quality);
    let mut ticker = crossbeam_channel::never::<Instant>();
    let mut renders = 0usize;

    loop {
        let wake = crossbeam_channel::select! {
            recv(shutdown) -> _ => Wake::Shutdown,
            recv(feed_rx) -> event => Wake::Feed(event.ok()),
            recv(ticker) -> _ => Wake::Tick,
            recv(response_rx) -> outcome => Wake::Response(outcome.ok()),
        };

        match wake {
            Wake::Shutdown => break,
            Wake::Feed(Some(event)) => {
                if handle_feed_event(&mut capture, event, events) {
                    ticker = crossbeam_channel::tick(config.interval);
                }
            }
            // Feed thread is gone; stop selecting on its channel.
            Wake::Feed(None) => feed_rx = crossbeam_channel::never(),
            Wake::Tick => {
                let frame = feed.current_frame();
                if let TickOutcome::Submit(submission) = capture.tick(frame.as_ref()) {
                    publish_frame(&capture, &mut renders, events);
                    publish(events, SessionEvent::StateChanged(capture.state()));
                    log::debug!(
                        "Submitting frame {} ({}x{}, {} bytes)",
                        submission.frame_index,
                        submission.width,
                        submission.height,
                        submission.jpeg.len()
                    );
                    if request_tx.send(submission).is_err() {
                        let outcome = Err(DetectionError::Disconnected);
                        complete(&mut capture, outcome, None, &mut renders, events);
                    }
                }
            }
            Wake::Response(Some(outcome)) => {
                let frame = feed.current_frame();
                complete(&mut capture, outcome, frame.as_ref(), &mut renders, events);
            }
            Wake::Response(None) => {
                response_rx = crossbeam_channel::never();
                let outcome = Err(DetectionError::Disconnected);
                complete(&mut capture, outcome, None, &mut renders, events);
            }
        }
    }

    // A blocking request cannot be interrupted. The worker drops anything
    // still queued, discards the result of the current request and exits.
    cancelled.store(true, Ordering::SeqCst);
    drop(request_tx);
    drop(feed);
    log::info!("Capture session ended");
}

enum Wake {
    Shutdown,
    Feed(Option<FeedEvent>),
    Tick,
    Response(Option<DetectionOutcome>),
}

/// Returns true when polling should start.
fn handle_feed_event(
    capture: &mut CaptureLoop,
    event: FeedEvent,
    events: &Sender<SessionEvent>,
) -> bool {
    match event {
        FeedEvent::Acquired(info) => {
            if capture.on_stream_acquired(&info) {
                publish(events, SessionEvent::StateChanged(capture.state()));
            }
            false
        }
        FeedEvent::Denied(reason) => {
            capture.on_stream_denied(&reason);
            publish(events, SessionEvent::StreamDenied(reason));
            false
        }
        FeedEvent::FirstFrame { width, height } => {
            let started = capture.on_first_frame_ready(width, height);
            if started {
                publish(events, SessionEvent::StateChanged(capture.state()));
            }
            started
        }
        FeedEvent::Ended => {
            publish(events, SessionEvent::StreamEnded);
            false
        }
    }
}

fn complete(
    capture: &mut CaptureLoop,
    outcome: DetectionOutcome,
    frame: Option<&Frame>,
    renders: &mut usize,
    events: &Sender<SessionEvent>,
) {
    let failure = outcome.as_ref().err().map(|e| e.to_string());
    match capture.on_detection_complete(outcome, frame) {
        Completion::Applied { status_changed } => {
            if status_changed {
                publish(events, SessionEvent::StatusChanged(capture.status().clone()));
            }
            publish_frame(capture, renders, events);
        }
        Completion::Failed => {
            if let Some(message) = failure {
                publish(events, SessionEvent::RequestFailed(message));
            }
        }
        Completion::Ignored => return,
    }
    publish(events, SessionEvent::StateChanged(capture.state()));
}

fn publish_frame(capture: &CaptureLoop, renders: &mut usize, events: &Sender<SessionEvent>) {
    publish(
        events,
        SessionEvent::FrameRendered(capture.canvas().snapshot(*renders)),
    );
    *renders += 1;
}

fn publish(events: &Sender<SessionEvent>, event: SessionEvent) {
    // The front end may already be gone during teardown.
    let _ = events.send(event);
}

fn spawn_detection_worker(
    client: Box<dyn DetectionClient>,
    requests: Receiver<FrameSubmission>,
    responses: Sender<DetectionOutcome>,
    cancelled: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for submission in requests.iter() {
            if cancelled.load(Ordering::SeqCst) {
                log::debug!("Session ended; frame {} not sent", submission.frame_index);
                break;
            }
            let started = Instant::now();
            let outcome = client.detect(submission.jpeg);
            log::debug!(
                "Detection for frame {} took {:.0}ms",
                submission.frame_index,
                started.elapsed().as_secs_f64() * 1000.0
            );
            if cancelled.load(Ordering::SeqCst) {
                log::debug!("Session ended; discarding result for frame {}", submission.frame_index);
                break;
            }
            if responses.send(outcome).is_err() {
                break;
            }
        }
    })
}
