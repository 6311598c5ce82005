use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use iced::{Subscription, Task};
use rfd::{AsyncFileDialog, AsyncMessageDialog, MessageButtons, MessageLevel};
use tracing::{error, info, warn};

use crate::application::{BatchEvent, BatchHandle, BatchRunner};
use crate::config::ConfigStore;
use crate::domain::JobFailure;
use crate::fetcher::{FetchOptions, YtDlpFetcher};
use crate::ui::{DownloadMessage, DownloadView};
use crate::utils::{failure_summary, parse_url_lines};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A batch the shell is still watching.
struct ActiveBatch {
    handle: BatchHandle,
    events: Receiver<BatchEvent>,
}

pub struct DownloadApp {
    view: DownloadView,
    config: ConfigStore,
    runner: BatchRunner,
    active: Option<ActiveBatch>,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadApp {
    pub fn new() -> Self {
        let config = ConfigStore::locate();
        info!(path = %config.path().display(), "Using config file");
        let fetcher = YtDlpFetcher::new(FetchOptions::from_env());
        let runner = BatchRunner::new(Arc::new(fetcher));

        let mut view = DownloadView::default();
        if let Some(directory) = config.load() {
            info!(directory = %directory, "Loaded download directory");
            view.download_directory = directory;
        }

        Self {
            view,
            config,
            runner,
            active: None,
        }
    }

    /// Copies the runner's state into the view.
    fn sync_view(&mut self) {
        let snapshot = self.runner.snapshot();
        self.view.status_message = snapshot.status_message;
        self.view.progress = f32::from(snapshot.progress_percent);
        self.view.failure_summary = failure_summary(snapshot.failures.len(), snapshot.total_count);
        self.view.is_downloading = snapshot.phase.is_running();
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    DirectoryPicked(Option<PathBuf>),
    /// Poll of the running batch
    Tick,
    DialogClosed,
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::ChooseDirectoryPressed => {
                    return Task::perform(
                        async {
                            AsyncFileDialog::new()
                                .set_title("Select Download Directory")
                                .pick_folder()
                                .await
                                .map(|handle| handle.path().to_path_buf())
                        },
                        Message::DirectoryPicked,
                    );
                }
                DownloadMessage::DownloadPressed => return start_batch(app),
                DownloadMessage::CancelPressed => {
                    if let Some(active) = &app.active {
                        info!("Cancelling download batch after the current job");
                        active.handle.cancel();
                    }
                }
                DownloadMessage::UrlsEdited(_) | DownloadMessage::FormatSelected(_) => {}
            }
        }
        Message::DirectoryPicked(Some(path)) => {
            let directory = path.display().to_string();
            app.view.download_directory = directory.clone();

            return match app.config.save(&directory) {
                Ok(()) => notify(
                    MessageLevel::Info,
                    "Directory Set",
                    format!("Download directory set to:\n{}", directory),
                ),
                Err(e) => {
                    error!(error = %e, "Failed to persist download directory");
                    notify(
                        MessageLevel::Warning,
                        "Directory Set",
                        format!(
                            "Download directory set to:\n{}\n\nIt could not be saved for next time: {}",
                            directory, e
                        ),
                    )
                }
            };
        }
        Message::DirectoryPicked(None) => {}
        Message::Tick => return poll_batch(app),
        Message::DialogClosed => {}
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}

pub fn subscription(app: &DownloadApp) -> Subscription<Message> {
    if app.active.is_some() {
        iced::time::every(POLL_INTERVAL).map(|_| Message::Tick)
    } else {
        Subscription::none()
    }
}

fn start_batch(app: &mut DownloadApp) -> Task<Message> {
    // Report anything left over from a batch that ended between polls
    let leftover = poll_batch(app);

    let urls = parse_url_lines(&app.view.urls.text());
    // Subscribe first so no event of the new batch is missed
    let events = app.runner.subscribe();

    match app
        .runner
        .start(urls, &app.view.download_directory, app.view.format)
    {
        Ok(handle) => {
            app.active = Some(ActiveBatch { handle, events });
            app.sync_view();
            leftover
        }
        Err(e) => {
            warn!(error = %e, "Download request rejected");
            Task::batch([leftover, notify(MessageLevel::Error, "Error", e.to_string())])
        }
    }
}

fn poll_batch(app: &mut DownloadApp) -> Task<Message> {
    let Some(active) = &app.active else {
        return Task::none();
    };

    // Checked before draining: a finished worker has already sent everything
    let finished = active.handle.is_finished();
    let failures: Vec<JobFailure> = active
        .events
        .try_iter()
        .filter_map(|event| match event {
            BatchEvent::JobFailed(failure) => Some(failure),
            _ => None,
        })
        .collect();

    if finished {
        app.active = None;
    }
    app.sync_view();

    Task::batch(failures.into_iter().map(|failure| {
        notify(
            MessageLevel::Error,
            "Error",
            format!("Failed to download {}:\n{}", failure.url, failure.error),
        )
    }))
}

fn notify(level: MessageLevel, title: &str, description: String) -> Task<Message> {
    let title = title.to_string();
    Task::perform(
        async move {
            AsyncMessageDialog::new()
                .set_level(level)
                .set_title(title)
                .set_description(description)
                .set_buttons(MessageButtons::Ok)
                .show()
                .await;
        },
        |_| Message::DialogClosed,
    )
}
