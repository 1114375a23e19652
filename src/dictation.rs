//! Voice input: records microphone audio with ffmpeg into a temporary file.
//!
//! The recorder owns the ffmpeg child process and the temporary file. Every
//! exit path (stop, cancel, failure) terminates the process and removes the
//! file, and a new session first cleans up anything a previous one left behind.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use serde::Serialize;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
    time::{sleep, timeout},
};

use crate::error::{BridgeError, Error, Result};

const PROGRAM: &str = "ffmpeg";
const FALLBACK_PATHS: &[&str] = &[
    "/usr/bin/ffmpeg",
    "/usr/local/bin/ffmpeg",
    "/opt/homebrew/bin/ffmpeg",
    "C:\\ffmpeg\\bin\\ffmpeg.exe",
];
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);
const FLUSH_DELAY: Duration = Duration::from_millis(500);

const DSHOW_AUDIO_DEVICE: &str = r#""([^"]+)" \(audio\)"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
}

impl Platform {
    pub const fn current() -> Option<Self> {
        if cfg!(target_os = "macos") {
            Some(Self::MacOs)
        } else if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else if cfg!(windows) {
            Some(Self::Windows)
        } else {
            None
        }
    }
}

/// ffmpeg arguments that record the default microphone to `output` as Opus.
pub fn record_args(platform: Platform, output: &Path, device: Option<&str>) -> Vec<String> {
    let input: [String; 4] = match platform {
        Platform::MacOs => ["-f".into(), "avfoundation".into(), "-i".into(), ":default".into()],
        Platform::Linux => ["-f".into(), "alsa".into(), "-i".into(), "default".into()],
        Platform::Windows => [
            "-f".into(),
            "dshow".into(),
            "-i".into(),
            format!("audio={}", device.unwrap_or("default")),
        ],
    };
    let encode = [
        "-c:a", "libopus", "-b:a", "32k", "-application", "voip", "-ar", "16000", "-ac", "1", "-y",
    ];
    input
        .into_iter()
        .chain(encode.into_iter().map(String::from))
        .chain([output.display().to_string()])
        .collect()
}

/// Pick the first audio device from `ffmpeg -list_devices` output.
pub fn parse_dshow_audio_device(output: &str) -> Option<String> {
    Regex::new(DSHOW_AUDIO_DEVICE)
        .ok()?
        .captures(output)
        .map(|caps| caps[1].to_string())
}

/// Locate ffmpeg on PATH, then in well-known install locations.
pub fn find_program() -> Result<PathBuf> {
    if let Ok(path) = which::which(PROGRAM) {
        return Ok(path);
    }
    FALLBACK_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .ok_or_else(|| {
            BridgeError::RecordingProgramNotFound {
                searched_paths: std::iter::once(format!("{PROGRAM} on PATH"))
                    .chain(FALLBACK_PATHS.iter().map(ToString::to_string))
                    .collect(),
            }
            .into()
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    pub is_recording: bool,
    pub duration_seconds: f64,
}

/// `{success, audioBase64?, error?}` reply for webview-style callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<String>> for RecordingResponse {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(audio) => Self {
                success: true,
                audio_base64: Some(audio),
                error: None,
            },
            Err(e) => Self::failure(&e),
        }
    }
}

impl From<Result<()>> for RecordingResponse {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                ..Self::default()
            },
            Err(e) => Self::failure(&e),
        }
    }
}

impl RecordingResponse {
    fn failure(e: &Error) -> Self {
        Self {
            success: false,
            audio_base64: None,
            error: Some(e.to_string()),
        }
    }
}

#[derive(Default)]
pub struct AudioRecorder {
    process: Option<Child>,
    started: Option<Instant>,
    output_file: Option<PathBuf>,
}

impl AudioRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an ffmpeg process is still running for this session.
    pub fn is_recording(&mut self) -> bool {
        self.process
            .as_mut()
            .is_some_and(|child| matches!(child.try_wait(), Ok(None)))
    }

    pub fn status(&mut self) -> RecordingStatus {
        let is_recording = self.is_recording();
        let duration_seconds = self
            .started
            .filter(|_| is_recording)
            .map_or(0.0, |t| t.elapsed().as_secs_f64());
        RecordingStatus {
            is_recording,
            duration_seconds,
        }
    }

    pub async fn start_recording(&mut self) -> Result<()> {
        if self.process.is_some() || self.output_file.is_some() {
            tracing::info!("Cleaning up stale recording resources");
            self.cleanup().await;
        }

        match self.spawn_recording().await {
            Ok(()) => {
                tracing::info!("Audio recording started");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to start audio recording: {e}");
                self.cleanup().await;
                Err(e)
            }
        }
    }

    async fn spawn_recording(&mut self) -> Result<()> {
        let program = find_program()?;
        let platform = Platform::current()
            .ok_or(BridgeError::Unsupported("Audio recording on this platform"))?;
        tracing::info!("Using recording program: {}", program.display());

        let device = if platform == Platform::Windows {
            discover_windows_device(&program).await
        } else {
            None
        };

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());
        let output = std::env::temp_dir().join(format!("coder_recording_{millis}.webm"));
        self.output_file = Some(output.clone());

        let mut child = Command::new(&program)
            .args(record_args(platform, &output, device.as_deref()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = line.trim();
                    if !line.is_empty() && !line.contains("In:") && !line.contains("Out:") {
                        tracing::debug!("Recording stderr: {line}");
                    }
                }
            });
        }

        self.process = Some(child);
        self.started = Some(Instant::now());
        Ok(())
    }

    /// Stop recording and return the audio as base64.
    pub async fn stop_recording(&mut self) -> Result<String> {
        if !self.is_recording() {
            // ffmpeg may have exited on its own; its output file is stale.
            self.cleanup().await;
            return Err(BridgeError::NotRecording.into());
        }
        tracing::info!("Stopping audio recording");

        let result = self.finish_recording().await;
        if let Err(e) = &result {
            tracing::error!("Failed to stop audio recording: {e}");
        }
        // Removes the temporary file on both paths.
        self.cleanup().await;
        result
    }

    async fn finish_recording(&mut self) -> Result<String> {
        self.terminate_process().await;
        self.started = None;
        sleep(FLUSH_DELAY).await;

        let path = self
            .output_file
            .clone()
            .ok_or_else(|| BridgeError::RecordingFileMissing(String::new()))?;
        if !path.exists() {
            return Err(BridgeError::RecordingFileMissing(path.display().to_string()).into());
        }
        let audio = tokio::fs::read(&path).await?;
        Ok(STANDARD.encode(audio))
    }

    /// Stop recording and discard the audio.
    pub async fn cancel_recording(&mut self) -> Result<()> {
        if !self.is_recording() {
            self.cleanup().await;
            return Err(BridgeError::NotRecording.into());
        }
        tracing::info!("Canceling audio recording");
        self.cleanup().await;
        Ok(())
    }

    /// Terminate the process and remove the temporary file.
    pub async fn cleanup(&mut self) {
        self.terminate_process().await;
        self.started = None;
        self.remove_output_file().await;
    }

    async fn terminate_process(&mut self) {
        let Some(mut child) = self.process.take() else {
            return;
        };
        tracing::info!("Terminating recording process");
        interrupt(&mut child);

        match timeout(TERMINATE_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => tracing::info!("Recording process exited with {status}"),
            Ok(Err(e)) => tracing::warn!("Failed to wait for recording process: {e}"),
            Err(_) => {
                tracing::warn!("Process termination timed out after {TERMINATE_TIMEOUT:?}");
                if let Err(e) = child.start_kill() {
                    tracing::warn!("Failed to kill recording process: {e}");
                }
            }
        }
    }

    async fn remove_output_file(&mut self) {
        let Some(path) = self.output_file.take() else {
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::info!("Temporary audio file cleaned up"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to clean up {}: {e}", path.display()),
        }
    }
}

/// ffmpeg finalizes the output file on SIGINT.
#[cfg(unix)]
fn interrupt(child: &mut Child) {
    use nix::{
        sys::signal::{kill, Signal},
        unistd::Pid,
    };

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGINT) {
        tracing::warn!("Failed to interrupt recording process: {e}");
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::warn!("Failed to stop recording process: {e}");
    }
}

async fn discover_windows_device(program: &Path) -> Option<String> {
    let output = Command::new(program)
        .args(["-list_devices", "true", "-f", "dshow", "-i", "dummy"])
        .stdin(Stdio::null())
        .output()
        .await;
    match output {
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let device = parse_dshow_audio_device(&stderr);
            if device.is_none() {
                tracing::warn!("No audio device in ffmpeg output, falling back to 'default'");
            }
            device.or_else(|| Some("default".to_string()))
        }
        Err(e) => {
            tracing::warn!("Failed to discover Windows audio device: {e}");
            None
        }
    }
}
