use std::time::Duration;

use crossbeam_channel::Receiver;
use iced::border::Border;
use iced::widget::{button, column, container, image, text};
use iced::{Color, Element, Length, Subscription, Task, Theme};

use maskwatch_core::capture::infrastructure::source_factory;
use maskwatch_core::detection::infrastructure::http_detection_client::HttpDetectionClient;
use maskwatch_core::rendering::status::StatusLabel;
use maskwatch_core::session::capture_session::{self, SessionEvent, SessionHandle, SessionParams};
use maskwatch_core::shared::constants::{DEFAULT_SURFACE_HEIGHT, DEFAULT_SURFACE_WIDTH};

use crate::settings::Settings;
use crate::theme;

pub const WINDOW_TITLE: &str = "Real-Time Face Mask Detection";

/// How often the window drains session events.
const POLL_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Debug, Clone)]
pub enum Message {
    Poll,
    Restart,
}

/// A running session and the channel it reports on.
struct Running {
    events: Receiver<SessionEvent>,
    // Dropped with the window, which stops the session and releases the camera.
    _handle: SessionHandle,
}

pub struct App {
    settings: Settings,
    session: Option<Running>,
    frame: Option<image::Handle>,
    status: StatusLabel,
    notice: Option<String>,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let mut app = Self {
            settings: Settings::load(),
            session: None,
            frame: None,
            status: StatusLabel::default(),
            notice: None,
        };
        app.start_session();
        (app, Task::none())
    }

    fn start_session(&mut self) {
        // Stop the old session first so the camera is free to reopen.
        self.session = None;
        self.frame = None;
        self.status = StatusLabel::default();
        self.notice = None;

        let client = match HttpDetectionClient::new(&self.settings.endpoint, self.settings.timeout())
        {
            Ok(client) => client,
            Err(e) => {
                log::error!("Could not create detection client: {e}");
                self.notice = Some(e.to_string());
                return;
            }
        };
        log::info!("Posting frames to {}", client.url());

        let source = source_factory::create_source(source_factory::resolve(
            self.settings.input.as_deref(),
            self.settings.input_format.as_deref(),
            self.settings.device.as_deref(),
        ));
        let (events, handle) = capture_session::spawn(SessionParams {
            source,
            client: Box::new(client),
            config: self.settings.session_config(),
        });
        self.session = Some(Running {
            events,
            _handle: handle,
        });
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Poll => self.drain_events(),
            Message::Restart => {
                self.settings.save();
                self.start_session();
            }
        }
        Task::none()
    }

    fn drain_events(&mut self) {
        let Some(running) = &self.session else {
            return;
        };
        let events: Vec<SessionEvent> = running.events.try_iter().collect();
        for event in events {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::FrameRendered(frame) => {
                let (width, height) = frame.dimensions();
                self.frame = Some(image::Handle::from_rgba(width, height, frame.to_rgba()));
            }
            SessionEvent::StatusChanged(label) => {
                self.status = label;
                self.notice = None;
            }
            SessionEvent::StreamDenied(reason) => {
                self.notice = Some(format!("Could not access camera: {reason}"));
            }
            SessionEvent::StreamEnded => {
                self.notice = Some("Input ended".to_string());
            }
            SessionEvent::RequestFailed(message) => {
                self.notice = Some(message);
            }
            SessionEvent::StateChanged(state) => {
                log::debug!("Session state: {state:?}");
            }
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let title = text(WINDOW_TITLE).size(28).color(Color::WHITE);

        let surface: Element<'_, Message> = match &self.frame {
            Some(handle) => image(handle.clone())
                .width(Length::Fixed(DEFAULT_SURFACE_WIDTH as f32))
                .height(Length::Fixed(DEFAULT_SURFACE_HEIGHT as f32))
                .into(),
            None => container(text("Waiting for camera...").color(Color::from_rgb8(0xaa, 0xaa, 0xaa)))
                .width(Length::Fixed(DEFAULT_SURFACE_WIDTH as f32))
                .height(Length::Fixed(DEFAULT_SURFACE_HEIGHT as f32))
                .center_x(Length::Fixed(DEFAULT_SURFACE_WIDTH as f32))
                .center_y(Length::Fixed(DEFAULT_SURFACE_HEIGHT as f32))
                .style(|_theme: &Theme| container::Style {
                    border: Border {
                        color: Color::WHITE,
                        width: 2.0,
                        ..Border::default()
                    },
                    ..container::Style::default()
                })
                .into(),
        };

        let background = theme::status_background(self.status.color());
        let status = container(text(self.status.to_string()).size(24).color(Color::WHITE))
            .padding([10, 20])
            .style(move |_theme: &Theme| container::Style {
                background: Some(background.into()),
                border: Border {
                    radius: 5.0.into(),
                    ..Border::default()
                },
                ..container::Style::default()
            });

        let mut content = column![title, surface, status]
            .spacing(20)
            .align_x(iced::Alignment::Center);

        if let Some(notice) = &self.notice {
            content = content
                .push(text(notice.as_str()).size(13).color(Color::from_rgb8(0xcc, 0xcc, 0xcc)))
                .push(
                    button(text("Retry").size(13))
                        .on_press(Message::Restart)
                        .style(button::secondary)
                        .padding([6, 14]),
                );
        }

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .padding(20)
            .into()
    }

    pub fn theme(&self) -> Theme {
        theme::resolve_theme()
    }

    pub fn subscription(&self) -> Subscription<Message> {
        if self.session.is_some() {
            iced::time::every(POLL_INTERVAL).map(|_| Message::Poll)
        } else {
            Subscription::none()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maskwatch_core::rendering::status::StatusColor;
    use maskwatch_core::session::capture_loop::SessionState;
    use maskwatch_core::shared::frame::Frame;

    fn idle_app() -> App {
        App {
            settings: Settings::default(),
            session: None,
            frame: None,
            status: StatusLabel::default(),
            notice: None,
        }
    }

    #[test]
    fn test_starts_detecting_without_frame() {
        let app = idle_app();
        assert_eq!(app.status.to_string(), "Status: Detecting...");
        assert_eq!(app.status.color(), StatusColor::Red);
        assert!(app.frame.is_none());
    }

    #[test]
    fn test_rendered_frame_becomes_image() {
        let mut app = idle_app();
        app.apply(SessionEvent::FrameRendered(Frame::new(vec![0; 4 * 3 * 3], 4, 3, 0)));
        assert!(app.frame.is_some());
    }

    #[test]
    fn test_status_change_updates_label_and_clears_notice() {
        let mut app = idle_app();
        app.notice = Some("detection service returned HTTP 500".to_string());

        app.apply(SessionEvent::StatusChanged(StatusLabel::new("Mask")));

        assert_eq!(app.status.as_str(), "Mask");
        assert_eq!(app.status.color(), StatusColor::Green);
        assert!(app.notice.is_none());
    }

    #[test]
    fn test_request_failure_keeps_status() {
        let mut app = idle_app();
        app.apply(SessionEvent::StatusChanged(StatusLabel::new("No Mask")));

        app.apply(SessionEvent::RequestFailed("timed out".to_string()));

        assert_eq!(app.status.as_str(), "No Mask");
        assert_eq!(app.notice.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_denied_stream_shows_reason() {
        let mut app = idle_app();
        app.apply(SessionEvent::StreamDenied("Permission denied".to_string()));

        assert_eq!(
            app.notice.as_deref(),
            Some("Could not access camera: Permission denied")
        );
        assert_eq!(app.status.as_str(), "Detecting...");
    }

    #[test]
    fn test_stream_end_and_state_changes() {
        let mut app = idle_app();
        app.apply(SessionEvent::StateChanged(SessionState::Polling));
        assert!(app.notice.is_none());

        app.apply(SessionEvent::StreamEnded);
        assert_eq!(app.notice.as_deref(), Some("Input ended"));
    }

    #[test]
    fn test_poll_without_session_is_noop() {
        let mut app = idle_app();
        let _ = app.update(Message::Poll);
        assert!(app.frame.is_none());
        assert!(app.notice.is_none());
    }
}
