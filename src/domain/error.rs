use thiserror::Error;

/// Reasons a batch is refused before any work is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter one or more YouTube URLs.")]
    NoUrls,

    #[error("Please set a download directory first.")]
    NoDirectory,

    #[error("A download is already in progress.")]
    AlreadyRunning,
}

/// Failure of a single job. Aborts that job only, never the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("Media unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Post-processing failed: {0}")]
    Postprocess(String),

    #[error("yt-dlp not found: {0}")]
    ToolMissing(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("{message}")]
    Failed {
        exit_code: Option<i32>,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to write config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode config: {0}")]
    Serialize(#[from] serde_json::Error),
}
