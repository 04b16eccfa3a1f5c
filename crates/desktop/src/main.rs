mod app;
mod settings;
mod theme;

use app::App;

fn main() -> iced::Result {
    env_logger::init();

    iced::application(App::new, App::update, App::view)
        .title(app::WINDOW_TITLE)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(iced::window::Settings {
            size: iced::Size::new(720.0, 700.0),
            ..Default::default()
        })
        .run()
}
