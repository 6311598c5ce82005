use std::fmt;
use std::str::FromStr;

use super::FetchError;

pub const STATUS_IDLE: &str = "Idle";
pub const STATUS_ALL_COMPLETE: &str = "All downloads complete!";
pub const STATUS_CANCELLED: &str = "Download cancelled";

/// What a job should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaFormat {
    /// Best video and audio merged into one container
    #[default]
    Video,
    /// Best audio stream transcoded to a fixed codec
    Audio,
}

impl MediaFormat {
    pub fn label(self) -> &'static str {
        match self {
            MediaFormat::Video => "Video (MP4)",
            MediaFormat::Audio => "Audio only (MP3)",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaFormat::Video => f.write_str("video"),
            MediaFormat::Audio => f.write_str("audio"),
        }
    }
}

impl FromStr for MediaFormat {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(MediaFormat::Video),
            "audio" => Ok(MediaFormat::Audio),
            other => Err(FetchError::InvalidFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    pub format: MediaFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    Running,
    Completed,
    PartiallyFailed,
    Cancelled,
}

impl BatchPhase {
    pub fn is_running(self) -> bool {
        self == BatchPhase::Running
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub index: usize,
    pub url: String,
    pub error: FetchError,
}

/// Point-in-time view of the running (or last) batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSnapshot {
    pub phase: BatchPhase,
    pub current_index: usize,
    pub total_count: usize,
    pub status_message: String,
    pub progress_percent: u8,
    pub failures: Vec<JobFailure>,
}

impl Default for BatchSnapshot {
    fn default() -> Self {
        Self {
            phase: BatchPhase::Idle,
            current_index: 0,
            total_count: 0,
            status_message: STATUS_IDLE.to_string(),
            progress_percent: 0,
            failures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Downloading,
    Finished,
    Error,
    Other,
}

impl TickStatus {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "downloading" => TickStatus::Downloading,
            "finished" => TickStatus::Finished,
            "error" => TickStatus::Error,
            _ => TickStatus::Other,
        }
    }
}

/// One progress report from the fetch adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTick {
    pub status: TickStatus,
    pub downloaded_bytes: u64,
    /// `None` when the size is unknown
    pub total_bytes: Option<u64>,
}

/// `floor(downloaded / total * 100)`, or `None` when the total is unknown or zero.
pub fn compute_percent(downloaded: u64, total: Option<u64>) -> Option<u8> {
    match total {
        Some(total) if total > 0 => {
            let percent = (downloaded as u128 * 100) / total as u128;
            Some(percent.min(100) as u8)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_percent() {
        assert_eq!(compute_percent(50, Some(200)), Some(25));
        assert_eq!(compute_percent(199, Some(200)), Some(99));
        assert_eq!(compute_percent(200, Some(200)), Some(100));
    }

    #[test]
    fn test_compute_percent_unknown_total() {
        assert_eq!(compute_percent(5, Some(0)), None);
        assert_eq!(compute_percent(5, None), None);
    }

    #[test]
    fn test_compute_percent_clamps_overshoot() {
        // estimates can undershoot the real size
        assert_eq!(compute_percent(300, Some(200)), Some(100));
    }

    #[test]
    fn test_media_format_parse() {
        assert_eq!("video".parse::<MediaFormat>(), Ok(MediaFormat::Video));
        assert_eq!(" AUDIO ".parse::<MediaFormat>(), Ok(MediaFormat::Audio));
        assert_eq!(
            "flac".parse::<MediaFormat>(),
            Err(FetchError::InvalidFormat("flac".to_string()))
        );
    }

    #[test]
    fn test_default_snapshot_is_idle() {
        let snapshot = BatchSnapshot::default();
        assert_eq!(snapshot.phase, BatchPhase::Idle);
        assert_eq!(snapshot.status_message, "Idle");
        assert!(snapshot.failures.is_empty());
    }
}
