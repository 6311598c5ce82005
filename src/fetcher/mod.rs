pub mod models;
pub mod ytdlp;

use std::path::Path;

use crate::domain::{FetchError, MediaFormat, ProgressTick};

pub use models::FetchOptions;
pub use ytdlp::YtDlpFetcher;

pub type Result<T> = std::result::Result<T, FetchError>;

/// Boundary to the external download/transcode capability.
///
/// `fetch` blocks until the media is saved (or fails) and calls `on_progress`
/// synchronously on the calling thread.
pub trait MediaFetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        destination_dir: &Path,
        format: MediaFormat,
        on_progress: &mut dyn FnMut(ProgressTick),
    ) -> Result<()>;
}
