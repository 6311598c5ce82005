use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::{ProgressTick, TickStatus};

/// Env var pointing at a specific yt-dlp executable
pub const YTDLP_ENV: &str = "YT_BATCH_YTDLP";

/// Prefix yt-dlp writes before each JSON progress record
pub const PROGRESS_MARKER: &str = "ytbatch-progress:";

/// Configuration for the yt-dlp adapter
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Explicit binary; looked up on `PATH` when `None`
    pub binary: Option<PathBuf>,
    pub retries: u32,
    pub audio_codec: String,
    pub audio_quality: String,
    pub merge_container: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            binary: None,
            retries: 3,
            audio_codec: "mp3".to_string(),
            audio_quality: "192K".to_string(),
            merge_container: "mp4".to_string(),
        }
    }
}

impl FetchOptions {
    pub fn from_env() -> Self {
        Self {
            binary: std::env::var_os(YTDLP_ENV).map(PathBuf::from),
            ..Self::default()
        }
    }
}

/// Subset of yt-dlp's progress dictionary, as printed by `%(progress)j`
#[derive(Debug, Clone, Deserialize)]
pub struct RawProgress {
    pub status: String,
    #[serde(default)]
    pub downloaded_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes_estimate: Option<f64>,
}

impl From<RawProgress> for ProgressTick {
    fn from(raw: RawProgress) -> Self {
        let total = raw
            .total_bytes
            .or(raw.total_bytes_estimate)
            .filter(|t| *t > 0.0)
            .map(|t| t as u64);

        ProgressTick {
            status: TickStatus::from_tag(&raw.status),
            downloaded_bytes: raw.downloaded_bytes.unwrap_or(0.0).max(0.0) as u64,
            total_bytes: total,
        }
    }
}

/// Extracts a tick from one line of yt-dlp stdout; `None` for every other line.
pub fn parse_progress_line(line: &str) -> Option<ProgressTick> {
    let payload = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let raw: RawProgress = serde_json::from_str(payload).ok()?;
    Some(raw.into())
}
