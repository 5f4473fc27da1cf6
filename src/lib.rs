//! Omnibridge - Multi-modal gateway to a TCP inference backend
//!
//! Accepts voice-mimicry and image-captioning jobs over HTTP or the command
//! line, prepares the reference media and drives the model service through
//! the [`bridge`] protocol client.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod preprocess;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

pub use crate::bridge::{Bridge, BridgeError, BridgeRequest, CorrelatedResult, TcpTransport};
pub use crate::config::Config;
pub use crate::preprocess::{
    AudioPreprocessor, FfmpegAudioPreprocessor, ImageCrateImagePreprocessor, ImagePreprocessor,
};

#[cfg(any(test, feature = "test-utils"))]
use crate::bridge::ModelTransport;

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    pub start_time: Instant,
    /// Protocol client for the model service
    pub bridge: Arc<Bridge>,
    /// Reference audio preparation (ffmpeg in production)
    pub audio: Arc<dyn AudioPreprocessor>,
    /// Reference image preparation
    pub image: Arc<dyn ImagePreprocessor>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config) -> Self {
        let transport = Arc::new(TcpTransport::new(config.model_service.clone()));
        let audio = Arc::new(FfmpegAudioPreprocessor::new(
            config.ffmpeg_path.clone(),
            config.ffprobe_path.clone(),
        ));

        Self {
            start_time: Instant::now(),
            bridge: Arc::new(Bridge::new(transport)),
            audio,
            image: Arc::new(ImageCrateImagePreprocessor::default()),
            config,
        }
    }

    /// Create an application state with injected collaborators
    ///
    /// Tests point the transport at a mock model service and replace the
    /// preprocessors with stubs so no ffmpeg binary is required.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_testing(
        config: Config,
        transport: Arc<dyn ModelTransport>,
        audio: Arc<dyn AudioPreprocessor>,
        image: Arc<dyn ImagePreprocessor>,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            bridge: Arc::new(Bridge::new(transport)),
            audio,
            image,
        }
    }
}
