//! Media pre-processing collaborators
//!
//! Turn an uploaded file into the reference payload the bridge sends: mono
//! `f32` samples for audio, a size-bounded PNG/JPEG stream for images.

pub mod audio;
pub mod image;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use self::audio::FfmpegAudioPreprocessor;
pub use self::image::ImageCrateImagePreprocessor;

/// Errors raised while validating or converting an input file
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed: {stderr}")]
    Command { tool: String, stderr: String },

    #[error("Failed to read audio file info: {0}")]
    Probe(String),

    #[error("No audio stream found in file")]
    NoAudioStream,

    #[error("Audio is empty")]
    EmptyAudio,

    #[error("Audio contains invalid values")]
    NonFiniteAudio,

    #[error("Unsupported image format: {0}. Use PNG or JPEG.")]
    UnsupportedImageFormat(String),

    #[error("Failed to process image: {0}")]
    Image(#[from] ::image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces validated mono samples from an audio file
#[async_trait]
pub trait AudioPreprocessor: Send + Sync {
    /// Clean `input` and resample it to `sample_rate`, using `work_dir` for intermediates
    async fn load(
        &self,
        input: &Path,
        work_dir: &Path,
        sample_rate: u32,
    ) -> Result<Vec<f32>, PreprocessError>;
}

/// Produces a validated, size-bounded encoded image from an image file
#[async_trait]
pub trait ImagePreprocessor: Send + Sync {
    async fn load(&self, input: &Path) -> Result<Vec<u8>, PreprocessError>;
}
