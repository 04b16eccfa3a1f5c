use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::capture::domain::frame_source::FrameSource;
use crate::shared::constants::FALLBACK_FPS;
use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The source opened; frames will follow.
    Acquired(StreamInfo),
    /// The source could not be opened (no device, access denied).
    Denied(String),
    /// Sent once, after the first frame is available via `current_frame`.
    FirstFrame { width: u32, height: u32 },
    /// A finite source ran out of frames.
    Ended,
}

/// Keeps the most recent frame of a source available, like a playing video
/// element that the capture loop samples from.
///
/// The source is opened, decoded and closed on a dedicated thread. Dropping
/// the feed stops that thread and releases the source.
///
/// The stop request is seen between frames. A source stalled inside a read
/// gets [`STOP_TIMEOUT`] to return; after that the thread is detached and
/// closes the source whenever the read comes back.
pub struct LiveFeed {
    latest: Arc<Mutex<Option<Frame>>>,
    stop: Arc<AtomicBool>,
    done: Receiver<()>,
    handle: Option<thread::JoinHandle<()>>,
}

pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

impl LiveFeed {
    pub fn start(source: Box<dyn FrameSource>, events: Sender<FeedEvent>) -> Self {
        let latest = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));

        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);

        let latest_clone = latest.clone();
        let stop_clone = stop.clone();
        let handle = thread::spawn(move || {
            // Disconnects `done` when the thread exits, panics included.
            let _done = done_tx;
            run_feed(source, &events, &latest_clone, &stop_clone);
        });

        Self {
            latest,
            stop,
            done,
            handle: Some(handle),
        }
    }

    /// The newest decoded frame, if any has arrived yet.
    pub fn current_frame(&self) -> Option<Frame> {
        self.latest.lock().ok().and_then(|slot| slot.clone())
    }

    /// Stops decoding and waits for the source to be closed, at most
    /// [`STOP_TIMEOUT`]. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        let Some(handle) = self.handle.take() else {
            return;
        };
        match self.done.recv_timeout(STOP_TIMEOUT) {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Camera did not stop within {}s; releasing it in the background",
                    STOP_TIMEOUT.as_secs()
                );
            }
            _ => {
                if handle.join().is_err() {
                    log::error!("Live feed thread panicked");
                }
            }
        }
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_feed(
    mut source: Box<dyn FrameSource>,
    events: &Sender<FeedEvent>,
    latest: &Mutex<Option<Frame>>,
    stop: &AtomicBool,
) {
    let info = match source.open() {
        Ok(info) => info,
        Err(e) => {
            log::error!("Error accessing camera: {e}");
            let _ = events.send(FeedEvent::Denied(e.to_string()));
            return;
        }
    };
    let pace = frame_interval(&info);
    let _ = events.send(FeedEvent::Acquired(info));

    let mut announced = false;
    let mut exhausted = true;
    for result in source.frames() {
        if stop.load(Ordering::Relaxed) {
            exhausted = false;
            break;
        }
        let started = Instant::now();

        match result {
            Ok(frame) => {
                let (width, height) = frame.dimensions();
                if let Ok(mut slot) = latest.lock() {
                    *slot = Some(frame);
                }
                if !announced {
                    announced = true;
                    let _ = events.send(FeedEvent::FirstFrame { width, height });
                }
            }
            Err(e) => log::warn!("Dropped camera frame: {e}"),
        }

        if let Some(interval) = pace {
            thread::sleep(interval.saturating_sub(started.elapsed()));
        }
    }

    if exhausted && !stop.load(Ordering::Relaxed) {
        log::info!("Camera stream ended");
        let _ = events.send(FeedEvent::Ended);
    }
    source.close();
}

/// Live devices block on the hardware clock; anything else is replayed at
/// its nominal rate so the feed does not spin.
fn frame_interval(info: &StreamInfo) -> Option<Duration> {
    if info.live {
        return None;
    }
    let fps = if info.fps > 0.0 { info.fps } else { FALLBACK_FPS };
    Some(Duration::from_secs_f64(1.0 / fps))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubSource {
        frames: Vec<Frame>,
        repeat_last: bool,
        fail_open: bool,
        closed: Arc<AtomicBool>,
    }

    impl StubSource {
        fn new(frames: Vec<Frame>, repeat_last: bool) -> (Self, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            (
                Self {
                    frames,
                    repeat_last,
                    fail_open: false,
                    closed: closed.clone(),
                },
                closed,
            )
        }
    }

    impl FrameSource for StubSource {
        fn open(&mut self) -> Result<StreamInfo, Box<dyn std::error::Error>> {
            if self.fail_open {
                return Err("Permission denied".into());
            }
            Ok(StreamInfo {
                name: "stub".to_string(),
                width: 0,
                height: 0,
                fps: 200.0,
                live: false,
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            let last = self.frames.last().cloned();
            let tail = self
                .repeat_last
                .then(|| std::iter::repeat_with(move || last.clone()).map_while(|f| f))
                .into_iter()
                .flatten();
            Box::new(self.frames.clone().into_iter().chain(tail).map(Ok))
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::Relaxed);
        }
    }

    fn solid(width: u32, height: u32, value: u8, index: usize) -> Frame {
        Frame::new(vec![value; (width * height * 3) as usize], width, height, index)
    }

    fn next_event(rx: &Receiver<FeedEvent>) -> FeedEvent {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_emits_acquired_then_first_frame() {
        let (source, _closed) = StubSource::new(vec![solid(8, 6, 1, 0)], true);
        let (tx, rx) = crossbeam_channel::unbounded();
        let feed = LiveFeed::start(Box::new(source), tx);

        assert!(matches!(next_event(&rx), FeedEvent::Acquired(_)));
        assert_eq!(
            next_event(&rx),
            FeedEvent::FirstFrame {
                width: 8,
                height: 6
            }
        );
        assert_eq!(feed.current_frame().unwrap().dimensions(), (8, 6));
    }

    #[test]
    fn test_open_failure_reports_denied() {
        let (mut source, closed) = StubSource::new(vec![], false);
        source.fail_open = true;
        let (tx, rx) = crossbeam_channel::unbounded();
        let feed = LiveFeed::start(Box::new(source), tx);

        assert_eq!(
            next_event(&rx),
            FeedEvent::Denied("Permission denied".to_string())
        );
        assert!(feed.current_frame().is_none());
        drop(feed);
        assert!(!closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_finite_source_reports_end_and_keeps_last_frame() {
        let frames = vec![solid(4, 4, 10, 0), solid(4, 4, 20, 1)];
        let (source, closed) = StubSource::new(frames, false);
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut feed = LiveFeed::start(Box::new(source), tx);

        assert!(matches!(next_event(&rx), FeedEvent::Acquired(_)));
        assert!(matches!(next_event(&rx), FeedEvent::FirstFrame { .. }));
        assert_eq!(next_event(&rx), FeedEvent::Ended);
        feed.stop();

        assert!(closed.load(Ordering::Relaxed));
        assert_eq!(feed.current_frame().unwrap().index(), 1);
    }

    #[test]
    fn test_drop_releases_source() {
        let (source, closed) = StubSource::new(vec![solid(4, 4, 0, 0)], true);
        let (tx, rx) = crossbeam_channel::unbounded();
        let feed = LiveFeed::start(Box::new(source), tx);
        assert!(matches!(next_event(&rx), FeedEvent::Acquired(_)));

        drop(feed);

        assert!(closed.load(Ordering::Relaxed));
    }

    /// Opens fine, then blocks inside the first read.
    struct StalledSource {
        stall: Duration,
    }

    impl FrameSource for StalledSource {
        fn open(&mut self) -> Result<StreamInfo, Box<dyn std::error::Error>> {
            Ok(StreamInfo {
                name: "stalled".to_string(),
                width: 4,
                height: 4,
                fps: 30.0,
                live: true,
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            let stall = self.stall;
            Box::new(std::iter::from_fn(move || {
                thread::sleep(stall);
                None
            }))
        }

        fn close(&mut self) {}
    }

    #[test]
    fn test_stop_is_bounded_when_source_stalls() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut feed = LiveFeed::start(
            Box::new(StalledSource {
                stall: STOP_TIMEOUT * 3,
            }),
            tx,
        );
        assert!(matches!(next_event(&rx), FeedEvent::Acquired(_)));

        let started = Instant::now();
        feed.stop();
        let waited = started.elapsed();

        assert!(waited >= STOP_TIMEOUT);
        assert!(waited < STOP_TIMEOUT * 2);
    }

    #[test]
    fn test_frame_interval() {
        let mut info = StreamInfo {
            name: String::new(),
            width: 0,
            height: 0,
            fps: 25.0,
            live: true,
        };
        assert_eq!(frame_interval(&info), None);

        info.live = false;
        assert_eq!(frame_interval(&info), Some(Duration::from_millis(40)));

        info.fps = 0.0;
        assert_eq!(
            frame_interval(&info),
            Some(Duration::from_secs_f64(1.0 / FALLBACK_FPS))
        );
    }
}
