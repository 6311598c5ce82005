use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::thread;

use regex::Regex;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::models::{parse_progress_line, FetchOptions, PROGRESS_MARKER};
use super::{MediaFetcher, Result};
use crate::domain::{FetchError, MediaFormat, ProgressTick};

const YTDLP_BIN: &str = "yt-dlp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    UnsupportedUrl,
    Unavailable,
    Postprocess,
    Network,
}

// First match wins
static FAILURE_PATTERNS: LazyLock<Vec<(FailureKind, Regex)>> = LazyLock::new(|| {
    [
        (
            FailureKind::UnsupportedUrl,
            r"(?i)unsupported url|is not a valid url",
        ),
        (
            FailureKind::Unavailable,
            r"(?i)video unavailable|private video|not available|geo[- ]?restrict|members[- ]only|been removed|sign in to confirm",
        ),
        (
            FailureKind::Postprocess,
            r"(?i)postprocessing|ffmpeg|ffprobe|conversion failed",
        ),
        (
            FailureKind::Network,
            r"(?i)unable to download|http error|timed out|connection|getaddrinfo|name or service not known|ssl|temporary failure",
        ),
    ]
    .into_iter()
    .filter_map(|(kind, pattern)| Regex::new(pattern).ok().map(|re| (kind, re)))
    .collect()
});

/// Media fetcher backed by the yt-dlp executable.
#[derive(Debug, Clone, Default)]
pub struct YtDlpFetcher {
    options: FetchOptions,
}

impl YtDlpFetcher {
    pub fn new(options: FetchOptions) -> Self {
        Self { options }
    }

    fn resolve_binary(&self) -> Result<PathBuf> {
        match &self.options.binary {
            Some(path) => Ok(path.clone()),
            None => which::which(YTDLP_BIN).map_err(|e| FetchError::ToolMissing(e.to_string())),
        }
    }
}

impl MediaFetcher for YtDlpFetcher {
    fn fetch(
        &self,
        url: &str,
        destination_dir: &Path,
        format: MediaFormat,
        on_progress: &mut dyn FnMut(ProgressTick),
    ) -> Result<()> {
        let url = check_url(url)?;
        let binary = self.resolve_binary()?;
        let args = build_args(&url, destination_dir, format, &self.options);

        info!(url = %url, %format, binary = %binary.display(), "Starting yt-dlp");
        debug!(?args, "yt-dlp arguments");

        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    FetchError::ToolMissing(format!("{}: {}", binary.display(), e))
                }
                _ => FetchError::Io(format!("Failed to start yt-dlp: {}", e)),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::Io("Failed to capture yt-dlp stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::Io("Failed to capture yt-dlp stderr".to_string()))?;

        // Drained on its own thread so a full stderr pipe can't stall the child
        let stderr_reader = thread::spawn(move || {
            let mut lines = Vec::new();
            for_each_line(stderr, |line| {
                debug!(target: "yt_batch_downloader::ytdlp", "{}", line);
                lines.push(line);
            });
            lines
        });

        for_each_line(stdout, |line| match parse_progress_line(&line) {
            Some(tick) => on_progress(tick),
            None => trace!(target: "yt_batch_downloader::ytdlp", "{}", line),
        });

        let status = child
            .wait()
            .map_err(|e| FetchError::Io(format!("Failed to wait for yt-dlp: {}", e)))?;
        let stderr_lines = stderr_reader.join().unwrap_or_default();

        if status.success() {
            info!(url = %url, "yt-dlp finished");
            Ok(())
        } else {
            let error = classify_failure(status.code(), &stderr_lines);
            warn!(url = %url, exit_code = ?status.code(), error = %error, "yt-dlp failed");
            Err(error)
        }
    }
}

/// Only absolute http(s) URLs are handed to yt-dlp.
pub fn check_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| FetchError::UnsupportedUrl(format!("{}: {}", raw.trim(), e)))?;
    if matches!(url.scheme(), "http" | "https") {
        Ok(url)
    } else {
        Err(FetchError::UnsupportedUrl(format!(
            "{}: unsupported scheme '{}'",
            url,
            url.scheme()
        )))
    }
}

/// `<dir>/<playlist title>/<title>.<ext>`; yt-dlp substitutes "NA" for the
/// playlist segment when the URL is a single video.
pub fn output_template(destination_dir: &Path) -> String {
    destination_dir
        .join("%(playlist_title)s")
        .join("%(title)s.%(ext)s")
        .to_string_lossy()
        .into_owned()
}

pub fn build_args(
    url: &Url,
    destination_dir: &Path,
    format: MediaFormat,
    options: &FetchOptions,
) -> Vec<String> {
    let retries = options.retries.to_string();
    let mut args: Vec<String> = vec![
        "--newline".into(),
        "--progress".into(),
        "--progress-template".into(),
        format!("download:{}%(progress)j", PROGRESS_MARKER),
        "--retries".into(),
        retries.clone(),
        "--fragment-retries".into(),
        retries,
        "-o".into(),
        output_template(destination_dir),
    ];

    match format {
        MediaFormat::Video => args.extend([
            "-f".into(),
            "bestvideo*+bestaudio/best".into(),
            "--merge-output-format".into(),
            options.merge_container.clone(),
        ]),
        MediaFormat::Audio => args.extend([
            "-f".into(),
            "bestaudio/best".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            options.audio_codec.clone(),
            "--audio-quality".into(),
            options.audio_quality.clone(),
        ]),
    }

    args.push("--".into());
    args.push(url.to_string());
    args
}

fn classify_failure(exit_code: Option<i32>, stderr_lines: &[String]) -> FetchError {
    let message = stderr_lines
        .iter()
        .rev()
        .find_map(|line| line.trim().strip_prefix("ERROR:").map(str::trim))
        .or_else(|| {
            stderr_lines
                .iter()
                .rev()
                .map(|line| line.trim())
                .find(|line| !line.is_empty())
        })
        .map(str::to_string)
        .unwrap_or_else(|| match exit_code {
            Some(code) => format!("yt-dlp exited with status {}", code),
            None => "yt-dlp was terminated by a signal".to_string(),
        });

    let kind = FAILURE_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(&message))
        .map(|(kind, _)| *kind);

    match kind {
        Some(FailureKind::UnsupportedUrl) => FetchError::UnsupportedUrl(message),
        Some(FailureKind::Unavailable) => FetchError::Unavailable(message),
        Some(FailureKind::Postprocess) => FetchError::Postprocess(message),
        Some(FailureKind::Network) => FetchError::Network(message),
        None => FetchError::Failed { exit_code, message },
    }
}

/// Feeds each line to `f`, replacing invalid UTF-8 instead of stopping.
fn for_each_line(reader: impl Read, mut f: impl FnMut(String)) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                f(line.trim_end_matches(['\r', '\n']).to_string());
            }
            Err(e) => {
                warn!(error = %e, "Failed to read yt-dlp output");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_audio_args_request_transcode() {
        let args = build_args(
            &url("https://www.youtube.com/watch?v=abc"),
            Path::new("/tmp/out"),
            MediaFormat::Audio,
            &FetchOptions::default(),
        );
        assert!(args.windows(2).any(|w| w == ["-f", "bestaudio/best"]));
        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.windows(2).any(|w| w == ["--audio-format", "mp3"]));
        assert!(args.windows(2).any(|w| w == ["--audio-quality", "192K"]));
        assert!(!args.contains(&"--merge-output-format".to_string()));
    }

    #[test]
    fn test_video_args_merge_without_transcode() {
        let args = build_args(
            &url("https://www.youtube.com/watch?v=abc"),
            Path::new("/tmp/out"),
            MediaFormat::Video,
            &FetchOptions::default(),
        );
        assert!(args.windows(2).any(|w| w == ["-f", "bestvideo*+bestaudio/best"]));
        assert!(args.windows(2).any(|w| w == ["--merge-output-format", "mp4"]));
        assert!(!args.contains(&"--extract-audio".to_string()));
        assert!(!args.contains(&"--audio-format".to_string()));
    }

    #[test]
    fn test_args_carry_retries_template_and_url_last() {
        let options = FetchOptions {
            retries: 5,
            ..FetchOptions::default()
        };
        let args = build_args(
            &url("https://youtu.be/abc"),
            Path::new("/tmp/out"),
            MediaFormat::Video,
            &options,
        );
        assert!(args.windows(2).any(|w| w == ["--retries", "5"]));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "-o" && w[1] == output_template(Path::new("/tmp/out"))));
        assert_eq!(args[args.len() - 2], "--");
        assert_eq!(args.last().unwrap(), "https://youtu.be/abc");
    }

    #[test]
    fn test_output_template_nests_playlist_folder() {
        let template = output_template(Path::new("/tmp/out"));
        assert_eq!(
            PathBuf::from(template),
            Path::new("/tmp/out")
                .join("%(playlist_title)s")
                .join("%(title)s.%(ext)s")
        );
    }

    #[test]
    fn test_check_url() {
        assert!(check_url("https://www.youtube.com/playlist?list=PL1").is_ok());
        assert!(check_url("  http://youtu.be/abc  ").is_ok());
        assert!(matches!(
            check_url("not a url"),
            Err(FetchError::UnsupportedUrl(_))
        ));
        assert!(matches!(
            check_url("ftp://example.com/video"),
            Err(FetchError::UnsupportedUrl(_))
        ));
    }

    #[test]
    fn test_classify_failures() {
        let cases = [
            (
                "ERROR: [youtube] abc: Video unavailable",
                "unavailable",
            ),
            ("ERROR: Unsupported URL: https://example.com", "unsupported"),
            (
                "ERROR: Postprocessing: ffprobe and ffmpeg not found.",
                "postprocess",
            ),
            (
                "ERROR: Unable to download webpage: <urlopen error [Errno -2] Name or service not known>",
                "network",
            ),
        ];
        for (line, expected) in cases {
            let error = classify_failure(Some(1), &lines(&["[youtube] abc: Downloading", line]));
            let actual = match error {
                FetchError::Unavailable(_) => "unavailable",
                FetchError::UnsupportedUrl(_) => "unsupported",
                FetchError::Postprocess(_) => "postprocess",
                FetchError::Network(_) => "network",
                _ => "other",
            };
            assert_eq!(actual, expected, "{}", line);
        }
    }

    #[test]
    fn test_classify_uses_last_error_line() {
        let error = classify_failure(
            Some(1),
            &lines(&["ERROR: first problem", "WARNING: noise", "ERROR: something odd"]),
        );
        assert_eq!(
            error,
            FetchError::Failed {
                exit_code: Some(1),
                message: "something odd".to_string()
            }
        );
    }

    #[test]
    fn test_classify_without_output() {
        let error = classify_failure(Some(2), &[]);
        assert_eq!(error.to_string(), "yt-dlp exited with status 2");
    }

    #[test]
    fn test_invalid_url_rejected_before_spawn() {
        let fetcher = YtDlpFetcher::new(FetchOptions {
            binary: Some(PathBuf::from("/nonexistent/yt-dlp")),
            ..FetchOptions::default()
        });
        let mut ticks = 0;
        let result = fetcher.fetch(
            "definitely not a url",
            Path::new("/tmp/out"),
            MediaFormat::Video,
            &mut |_| ticks += 1,
        );
        assert!(matches!(result, Err(FetchError::UnsupportedUrl(_))));
        assert_eq!(ticks, 0);
    }

    #[test]
    fn test_missing_binary_reported() {
        let fetcher = YtDlpFetcher::new(FetchOptions {
            binary: Some(PathBuf::from("/nonexistent/yt-dlp")),
            ..FetchOptions::default()
        });
        let result = fetcher.fetch(
            "https://www.youtube.com/watch?v=abc",
            Path::new("/tmp/out"),
            MediaFormat::Audio,
            &mut |_| {},
        );
        assert!(matches!(result, Err(FetchError::ToolMissing(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_fake_binary_progress_and_failure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();

        let ok_script = dir.path().join("ok-yt-dlp");
        std::fs::write(
            &ok_script,
            concat!(
                "#!/bin/sh\n",
                "echo '[youtube] abc: Downloading webpage'\n",
                "echo 'ytbatch-progress:{\"status\": \"downloading\", \"downloaded_bytes\": 50, \"total_bytes\": 200}'\n",
                "echo 'ytbatch-progress:{\"status\": \"finished\", \"downloaded_bytes\": 200, \"total_bytes\": 200}'\n",
                "exit 0\n",
            ),
        )
        .unwrap();
        std::fs::set_permissions(&ok_script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let fetcher = YtDlpFetcher::new(FetchOptions {
            binary: Some(ok_script),
            ..FetchOptions::default()
        });
        let mut ticks = Vec::new();
        fetcher
            .fetch(
                "https://www.youtube.com/watch?v=abc",
                dir.path(),
                MediaFormat::Video,
                &mut |tick| ticks.push(tick),
            )
            .unwrap();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].downloaded_bytes, 50);
        assert_eq!(ticks[0].total_bytes, Some(200));

        let failing_script = dir.path().join("failing-yt-dlp");
        std::fs::write(
            &failing_script,
            "#!/bin/sh\necho 'ERROR: [youtube] abc: Private video' >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&failing_script, std::fs::Permissions::from_mode(0o755))
            .unwrap();

        let fetcher = YtDlpFetcher::new(FetchOptions {
            binary: Some(failing_script),
            ..FetchOptions::default()
        });
        let result = fetcher.fetch(
            "https://www.youtube.com/watch?v=abc",
            dir.path(),
            MediaFormat::Audio,
            &mut |_| {},
        );
        assert_eq!(
            result,
            Err(FetchError::Unavailable(
                "[youtube] abc: Private video".to_string()
            ))
        );
    }
}
