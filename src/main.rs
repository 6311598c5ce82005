mod app;
mod application;
mod config;
mod domain;
mod fetcher;
mod logging;
mod ui;
mod utils;

use iced::{window, Size};

fn main() -> iced::Result {
    logging::init_tracing();

    iced::application(app::DownloadApp::default, app::update, app::view)
        .title("YouTube Video Downloader")
        .subscription(app::subscription)
        .window(window::Settings {
            size: Size::new(600.0, 650.0),
            ..Default::default()
        })
        .run()
}
