//! ffmpeg-backed audio cleaning
//!
//! Two passes: the first copies the stream while ignoring decode errors,
//! which repairs damaged containers; the second band-limits to the speech
//! range, downmixes to mono, resamples and emits raw little-endian `f32`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::{AudioPreprocessor, PreprocessError};

const SPEECH_BAND_FILTER: &str = "highpass=f=200,lowpass=f=3000";

/// Stream details reported by ffprobe
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFileInfo {
    pub file_size_bytes: u64,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u32,
    pub bit_rate: u64,
    pub format_name: String,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    format_name: Option<String>,
}

/// Parse ffprobe's JSON report into the details we log
fn parse_probe(json: &[u8], file_size_bytes: u64) -> Result<AudioFileInfo, PreprocessError> {
    let probe: ProbeOutput =
        serde_json::from_slice(json).map_err(|e| PreprocessError::Probe(e.to_string()))?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or(PreprocessError::NoAudioStream)?;

    Ok(AudioFileInfo {
        file_size_bytes,
        duration_seconds: parse_or_zero(probe.format.duration.as_deref()),
        sample_rate: parse_or_zero(stream.sample_rate.as_deref()),
        channels: stream.channels.unwrap_or(0),
        bit_rate: parse_or_zero(probe.format.bit_rate.as_deref()),
        format_name: probe
            .format
            .format_name
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

fn parse_or_zero<T: std::str::FromStr + Default>(value: Option<&str>) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or_default()
}

/// Decode raw little-endian `f32` bytes and validate the samples
pub fn samples_from_f32le(bytes: &[u8]) -> Result<Vec<f32>, PreprocessError> {
    let samples: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    if samples.is_empty() {
        return Err(PreprocessError::EmptyAudio);
    }
    if !samples.iter().all(|s| s.is_finite()) {
        return Err(PreprocessError::NonFiniteAudio);
    }
    Ok(samples)
}

/// Audio collaborator shelling out to ffmpeg and ffprobe
pub struct FfmpegAudioPreprocessor {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegAudioPreprocessor {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Inspect an audio file with ffprobe
    pub async fn probe(&self, path: &Path) -> Result<AudioFileInfo, PreprocessError> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path);
        let stdout = run(command).await?;
        let size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        parse_probe(&stdout, size)
    }

    async fn log_file_info(&self, path: &Path, stage: &str) -> Result<(), PreprocessError> {
        let info = self.probe(path).await.map_err(|e| {
            error!(path = %path.display(), stage, error = %e, "Failed to read audio file info");
            e
        })?;
        info!(
            path = %path.display(),
            stage,
            size_bytes = info.file_size_bytes,
            duration_seconds = info.duration_seconds,
            sample_rate = info.sample_rate,
            channels = info.channels,
            bit_rate = info.bit_rate,
            format = %info.format_name,
            "Audio file info"
        );
        Ok(())
    }
}

#[async_trait]
impl AudioPreprocessor for FfmpegAudioPreprocessor {
    async fn load(
        &self,
        input: &Path,
        work_dir: &Path,
        sample_rate: u32,
    ) -> Result<Vec<f32>, PreprocessError> {
        if tokio::fs::metadata(input).await.is_err() {
            return Err(PreprocessError::NotFound(input.to_path_buf()));
        }
        self.log_file_info(input, "input stage").await?;

        let repaired = work_dir.join("cleaned1.wav");
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-err_detect", "ignore_err", "-i"])
            .arg(input)
            .args(["-y", "-c", "copy"])
            .arg(&repaired);
        run(command).await?;
        self.log_file_info(&repaired, "after error detection pass").await?;

        let raw = work_dir.join("cleaned2.f32");
        let rate = sample_rate.to_string();
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-y", "-i"])
            .arg(&repaired)
            .args(["-af", SPEECH_BAND_FILTER, "-ac", "1", "-ar", rate.as_str(), "-f", "f32le"])
            .arg(&raw);
        run(command).await?;

        let bytes = tokio::fs::read(&raw).await?;
        let samples = samples_from_f32le(&bytes)?;
        info!(
            samples = samples.len(),
            sample_rate,
            duration_seconds = samples.len() as f64 / f64::from(sample_rate.max(1)),
            "Audio loaded"
        );
        Ok(samples)
    }
}

/// Run an external tool, returning stdout or the tool's stderr as an error
async fn run(mut command: Command) -> Result<Vec<u8>, PreprocessError> {
    let tool = command.as_std().get_program().to_string_lossy().into_owned();
    debug!(command = ?command.as_std(), "Running media command");

    let output = command
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| PreprocessError::Spawn {
            tool: tool.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(PreprocessError::Command {
            tool,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}
