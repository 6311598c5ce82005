use iced::{
    widget::{button, column, progress_bar, radio, row, text, text_editor, text_input, Space},
    Element, Length,
};

use crate::domain::model::STATUS_IDLE;
use crate::domain::MediaFormat;

/// Main view state
pub struct DownloadView {
    pub download_directory: String,
    pub urls: text_editor::Content,
    pub format: MediaFormat,
    pub status_message: String,
    /// 0.0 to 100.0
    pub progress: f32,
    pub failure_summary: Option<String>,
    pub is_downloading: bool,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            download_directory: String::new(),
            urls: text_editor::Content::new(),
            format: MediaFormat::default(),
            status_message: STATUS_IDLE.to_string(),
            progress: 0.0,
            failure_summary: None,
            is_downloading: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    ChooseDirectoryPressed,
    UrlsEdited(text_editor::Action),
    FormatSelected(MediaFormat),
    DownloadPressed,
    CancelPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlsEdited(action) => {
                self.urls.perform(action);
            }
            DownloadMessage::FormatSelected(format) => {
                self.format = format;
            }
            DownloadMessage::ChooseDirectoryPressed
            | DownloadMessage::DownloadPressed
            | DownloadMessage::CancelPressed => {
                // Will be handled by the app
            }
        }
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let formats = row![
            radio(
                MediaFormat::Video.label(),
                MediaFormat::Video,
                Some(self.format),
                DownloadMessage::FormatSelected,
            ),
            radio(
                MediaFormat::Audio.label(),
                MediaFormat::Audio,
                Some(self.format),
                DownloadMessage::FormatSelected,
            ),
        ]
        .spacing(20);

        let actions = row![
            button("Download")
                .on_press_maybe((!self.is_downloading).then_some(DownloadMessage::DownloadPressed))
                .padding([10, 20]),
            button("Cancel")
                .on_press_maybe(self.is_downloading.then_some(DownloadMessage::CancelPressed))
                .padding([10, 20]),
        ]
        .spacing(10);

        column![
            text("Welcome to YouTube Video Downloader").size(24),
            Space::new().height(Length::Fixed(10.0)),
            text("Download Directory:").size(16),
            text_input("No directory selected", &self.download_directory).padding(10),
            button("Set Download Directory")
                .on_press(DownloadMessage::ChooseDirectoryPressed)
                .padding([6, 12]),
            Space::new().height(Length::Fixed(10.0)),
            text("YouTube Video/Playlist URLs (one per line):").size(16),
            text_editor(&self.urls)
                .on_action(DownloadMessage::UrlsEdited)
                .height(Length::Fixed(180.0)),
            text("This tool works best for downloading full playlists. It will work for single videos too!")
                .size(12),
            formats,
            Space::new().height(Length::Fixed(10.0)),
            text(&self.status_message).size(14),
            text(self.failure_summary.as_deref().unwrap_or_default()).size(12),
            progress_bar(0.0..=100.0, self.progress),
            Space::new().height(Length::Fixed(10.0)),
            actions,
        ]
        .padding(20)
        .spacing(10)
        .into()
    }
}
