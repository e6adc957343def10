//! `MediaEngine` backed by the yt-dlp executable
//!
//! Two invocations per download:
//! 1. probe (`-J --flat-playlist`): metadata, prepared filename, collection detection
//! 2. download: fetch + post-process, with progress lines on stdout

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{
    EngineError, EngineRequest, MediaEngine, MediaInfo, PostProcessor, ProgressCallback,
    ProgressTick, TickStatus,
};

/// Prefix marking our progress lines among yt-dlp's output
const PROGRESS_PREFIX: &str = "[af-progress] ";

/// Fields: status | percent string | downloaded bytes | total bytes (or estimate)
const PROGRESS_TEMPLATE: &str = "download:[af-progress] %(progress.status)s|%(progress._percent_str)s|%(progress.downloaded_bytes)s|%(progress.total_bytes,progress.total_bytes_estimate)s";

/// Stderr lines kept for error reporting
const STDERR_TAIL_LINES: usize = 20;

/// yt-dlp driver
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    binary: PathBuf,
    ffmpeg_location: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl YtDlpEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ffmpeg_location: None,
            timeout: None,
        }
    }

    pub fn with_ffmpeg_location(mut self, location: Option<PathBuf>) -> Self {
        self.ffmpeg_location = location;
        self
    }

    /// Limit each invocation; `None` waits indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn output_template(request: &EngineRequest) -> String {
        request
            .output_dir
            .join(&request.output_template)
            .to_string_lossy()
            .into_owned()
    }

    /// Arguments of the metadata probe
    pub fn probe_args(&self, request: &EngineRequest) -> Vec<String> {
        let mut args = vec!["-J".to_string(), "--flat-playlist".to_string()];
        if request.no_playlist {
            args.push("--no-playlist".to_string());
        }
        args.extend([
            "-f".to_string(),
            request.format.clone(),
            "-o".to_string(),
            Self::output_template(request),
            "--".to_string(),
            request.url.clone(),
        ]);
        args
    }

    /// Arguments of the download + post-processing run
    pub fn download_args(&self, request: &EngineRequest) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            request.format.clone(),
            "-o".to_string(),
            Self::output_template(request),
        ];
        if request.no_playlist {
            args.push("--no-playlist".to_string());
        }
        if request.write_thumbnail {
            args.push("--write-thumbnail".to_string());
        }

        for pp in &request.postprocessors {
            match pp {
                PostProcessor::ExtractAudio {
                    codec,
                    bitrate_kbps,
                } => {
                    args.extend([
                        "--extract-audio".to_string(),
                        "--audio-format".to_string(),
                        codec.clone(),
                        "--audio-quality".to_string(),
                        format!("{}K", bitrate_kbps),
                    ]);
                }
                PostProcessor::EmbedMetadata => args.push("--embed-metadata".to_string()),
                PostProcessor::EmbedThumbnail => args.push("--embed-thumbnail".to_string()),
            }
        }

        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.to_string_lossy().into_owned());
        }

        args.extend([
            "--quiet".to_string(),
            "--progress".to_string(),
            "--newline".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--".to_string(),
            request.url.clone(),
        ]);
        args
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn spawn_error(&self, source: std::io::Error) -> EngineError {
        EngineError::Spawn {
            engine: self.binary.display().to_string(),
            source,
        }
    }

    async fn probe(&self, request: &EngineRequest) -> Result<MediaInfo, EngineError> {
        let args = self.probe_args(request);
        debug!(binary = %self.binary.display(), ?args, "Probing URL");

        let output_future = self.command(&args).output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, output_future)
                .await
                .map_err(|_| EngineError::Timeout(limit.as_secs()))?,
            None => output_future.await,
        }
        .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed {
                engine: "yt-dlp".to_string(),
                code: output.status.code(),
                message: summarize_stderr(stderr.lines()),
            });
        }

        parse_probe_output(&output.stdout, &request.output_dir)
    }

    async fn download(
        &self,
        request: &EngineRequest,
        on_progress: ProgressCallback<'_>,
    ) -> Result<(), EngineError> {
        let args = self.download_args(request);
        debug!(binary = %self.binary.display(), ?args, "Starting download");

        let mut child = self.command(&args).spawn().map_err(|e| self.spawn_error(e))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Parse("engine stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Parse("engine stderr not captured".to_string()))?;
        let stderr_task = tokio::spawn(collect_tail(stderr, STDERR_TAIL_LINES));

        let run = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                match parse_progress_line(&line) {
                    Some(tick) => on_progress(&tick),
                    None if !line.trim().is_empty() => debug!("yt-dlp> {}", line),
                    None => {}
                }
            }
            child.wait().await
        };

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.ok(),
            None => Some(run.await),
        };

        let status = match outcome {
            Some(status) => status?,
            None => {
                let limit = self.timeout.map(|d| d.as_secs()).unwrap_or_default();
                warn!("yt-dlp exceeded {}s, killing", limit);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill yt-dlp: {}", e);
                }
                return Err(EngineError::Timeout(limit));
            }
        };

        let stderr_tail = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(EngineError::Failed {
                engine: "yt-dlp".to_string(),
                code: status.code(),
                message: summarize_stderr(stderr_tail.iter().map(String::as_str)),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch(
        &self,
        request: &EngineRequest,
        on_progress: ProgressCallback<'_>,
    ) -> Result<MediaInfo, EngineError> {
        let info = self.probe(request).await?;
        if info.is_collection() {
            info!(
                url = %request.url,
                entries = info.entry_count.unwrap_or_default(),
                "URL resolved to a collection, skipping download"
            );
            return Ok(info);
        }

        self.download(request, on_progress).await?;
        Ok(info)
    }
}

/// Subset of yt-dlp's `-J` output
#[derive(Debug, Deserialize)]
struct ProbeJson {
    #[serde(rename = "_type")]
    kind: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    ext: Option<String>,
    filename: Option<String>,
    #[serde(rename = "_filename")]
    legacy_filename: Option<String>,
    entries: Option<Vec<serde_json::Value>>,
    playlist_count: Option<usize>,
}

/// Turn probe JSON into `MediaInfo`
pub fn parse_probe_output(stdout: &[u8], output_dir: &Path) -> Result<MediaInfo, EngineError> {
    let probe: ProbeJson = serde_json::from_slice(stdout)
        .map_err(|e| EngineError::Parse(format!("probe JSON: {}", e)))?;

    let is_collection = probe.kind.as_deref() == Some("playlist") || probe.entries.is_some();
    if is_collection {
        let entries = probe
            .entries
            .as_ref()
            .map(Vec::len)
            .or(probe.playlist_count)
            .unwrap_or_default();
        return Ok(MediaInfo {
            title: probe.title,
            uploader: probe.uploader,
            prepared_filename: PathBuf::new(),
            entry_count: Some(entries),
        });
    }

    let prepared = probe
        .filename
        .or(probe.legacy_filename)
        .map(PathBuf::from)
        .or_else(|| {
            let title = probe.title.as_deref()?;
            let ext = probe.ext.as_deref()?;
            Some(output_dir.join(format!("{}.{}", title, ext)))
        })
        .ok_or_else(|| EngineError::Parse("probe output has no filename".to_string()))?;

    Ok(MediaInfo {
        title: probe.title,
        uploader: probe.uploader,
        prepared_filename: prepared,
        entry_count: None,
    })
}

/// Parse one of our progress-template lines
pub fn parse_progress_line(line: &str) -> Option<ProgressTick> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX.trim_end())?.trim_start();
    let mut fields = rest.split('|');

    let status = match fields.next()?.trim() {
        "downloading" => TickStatus::Downloading,
        "finished" => TickStatus::Finished,
        _ => TickStatus::Other,
    };
    let percent_str = fields
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let mut bytes_field = || {
        fields
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "NA")
            .map(str::to_string)
    };
    let downloaded_bytes_str = bytes_field();
    let total_bytes_str = bytes_field();

    Some(ProgressTick {
        status,
        percent_str,
        downloaded_bytes_str,
        total_bytes_str,
    })
}

async fn collect_tail<R: AsyncRead + Unpin>(reader: R, keep: usize) -> Vec<String> {
    let mut tail = VecDeque::with_capacity(keep);
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tail.len() == keep {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect()
}

/// Pick the most useful line of engine stderr: last `ERROR:` line, else last line
fn summarize_stderr<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    let lines: Vec<&str> = lines.map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| "no error output".to_string())
}
