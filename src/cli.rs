//! Command-line front end
//!
//! Without `--mode` the binary serves HTTP. With a mode it runs a single job
//! against the model service and writes the results next to the working
//! directory (or `--output-dir`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use tracing::info;

use crate::bridge::Bridge;
use crate::preprocess::{AudioPreprocessor, ImagePreprocessor};
use crate::routes::describe_photo::{self, PhotoParams};
use crate::routes::voice_mimic::{self, VoiceParams, DEFAULT_MIMICK_PROMPT};

/// Omnibridge - voice mimicry and photo description over a model service
///
/// Examples:
///   omnibridge                                              # Start the server
///   omnibridge --mode voice_mimic --input-file ref.wav --texts "Hello"
///   omnibridge --mode describe_photo --image-file cat.png --prompts "What breed?"
#[derive(Debug, Parser)]
#[command(name = "omnibridge", version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Job to run; serves HTTP when omitted
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Reference recording for voice mimicry
    #[arg(long, alias = "input_file", value_name = "PATH")]
    pub input_file: Option<PathBuf>,

    /// Texts to speak in the reference voice
    #[arg(long, num_args = 1..)]
    pub texts: Vec<String>,

    /// Image to describe
    #[arg(long, alias = "image_file", value_name = "PATH")]
    pub image_file: Option<PathBuf>,

    /// Questions about the image
    #[arg(long, num_args = 1..)]
    pub prompts: Vec<String>,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.3)]
    pub temperature: f64,

    /// Maximum tokens generated per output
    #[arg(long, alias = "max_new_tokens", default_value_t = 128)]
    pub max_new_tokens: u32,

    /// Number of times the request is run
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeats: u32,

    /// Audio sample rate in Hz
    #[arg(long, alias = "sample_rate", default_value_t = 16000)]
    pub sample_rate: u32,

    /// Enable sampling during generation
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sampling: bool,

    /// Wrap texts in the TTS prompt template
    #[arg(long, alias = "use_tts_template", default_value_t = true, action = clap::ArgAction::Set)]
    pub use_tts_template: bool,

    /// Ask the model to produce audio
    #[arg(long, alias = "generate_audio", default_value_t = true, action = clap::ArgAction::Set)]
    pub generate_audio: bool,

    /// Directory receiving output files
    #[arg(long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    #[value(name = "voice_mimic")]
    VoiceMimic,
    #[value(name = "describe_photo")]
    DescribePhoto,
}

impl Cli {
    /// Check the inputs each mode requires
    pub fn validate(&self) -> Result<(), clap::Error> {
        let missing = match self.mode {
            Some(Mode::VoiceMimic) if self.input_file.is_none() => {
                Some("--input-file is required for voice_mimic mode")
            }
            Some(Mode::VoiceMimic) if self.texts.is_empty() => {
                Some("--texts is required for voice_mimic mode")
            }
            Some(Mode::DescribePhoto) if self.image_file.is_none() => {
                Some("--image-file is required for describe_photo mode")
            }
            Some(Mode::DescribePhoto) if self.prompts.is_empty() => {
                Some("--prompts is required for describe_photo mode")
            }
            _ => None,
        };

        match missing {
            Some(message) => Err(Cli::command().error(ErrorKind::MissingRequiredArgument, message)),
            None => Ok(()),
        }
    }

    pub fn voice_params(&self) -> VoiceParams {
        VoiceParams {
            sampling: self.sampling,
            max_new_tokens: self.max_new_tokens,
            use_tts_template: self.use_tts_template,
            temperature: self.temperature,
            generate_audio: self.generate_audio,
            sample_rate: self.sample_rate,
        }
    }

    pub fn photo_params(&self) -> PhotoParams {
        PhotoParams {
            temperature: self.temperature,
            max_new_tokens: self.max_new_tokens,
        }
    }
}

/// Text turn sent for each CLI voice target
pub fn speech_instruction(text: &str) -> String {
    format!("Say this \"{}\"", text)
}

/// `output_{index}.{ext}`, with the repeat appended when several repeats ran
pub fn output_path(dir: &Path, index: usize, repeat: u32, repeats: u32, ext: &str) -> PathBuf {
    if repeats > 1 {
        dir.join(format!("output_{}_{}.{}", index, repeat, ext))
    } else {
        dir.join(format!("output_{}.{}", index, ext))
    }
}

/// Contents of a description output file
pub fn description_file(prompt: &str, timestamp: &str, description: &str) -> String {
    format!(
        "# Prompt: {}\n# Timestamp: {}\n\n{}\n",
        prompt, timestamp, description
    )
}

/// Run voice mimicry from the command line, returning the files written
pub async fn run_voice_mimic(
    cli: &Cli,
    audio: &dyn AudioPreprocessor,
    bridge: &Bridge,
) -> Result<Vec<PathBuf>> {
    let input = cli
        .input_file
        .as_deref()
        .context("--input-file is required for voice_mimic mode")?;
    let params = cli.voice_params();

    let work_dir = tempfile::tempdir().context("Failed to create working directory")?;
    let samples = audio.load(input, work_dir.path(), params.sample_rate).await?;

    let texts: Vec<String> = cli.texts.iter().map(|t| speech_instruction(t)).collect();
    let request =
        voice_mimic::build_request(DEFAULT_MIMICK_PROMPT, &samples, &texts, &params, cli.repeats)?;
    let results = bridge.run_multi_output(&request).await?;

    let mut written = Vec::with_capacity(results.len());
    for result in results {
        let path = output_path(
            &cli.output_dir,
            result.input_index,
            result.repeat,
            cli.repeats,
            "wav",
        );
        tokio::fs::write(&path, &result.artifact)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), text = %result.input_text, "Audio saved");
        written.push(path);
    }
    Ok(written)
}

/// Run photo description from the command line, returning the files written
pub async fn run_describe_photo(
    cli: &Cli,
    image: &dyn ImagePreprocessor,
    bridge: &Bridge,
) -> Result<Vec<PathBuf>> {
    let input = cli
        .image_file
        .as_deref()
        .context("--image-file is required for describe_photo mode")?;

    let encoded = image.load(input).await?;
    let request =
        describe_photo::build_request(encoded, &cli.prompts, &cli.photo_params(), cli.repeats)?;
    let results = bridge.run_single_output(&request).await?;

    let timestamp = chrono::Utc::now().to_rfc3339();
    let mut written = Vec::with_capacity(results.len());
    for result in results {
        let path = output_path(
            &cli.output_dir,
            result.input_index,
            result.repeat,
            cli.repeats,
            "txt",
        );
        let contents = description_file(&result.input_text, &timestamp, &result.artifact);
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), prompt = %result.input_text, "Description saved");
        written.push(path);
    }
    Ok(written)
}
