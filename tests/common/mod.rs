//! Common test utilities for Omnibridge
//!
//! Shared fixtures for the integration tests: configuration, stub media
//! preprocessors, multipart bodies and a ready-made test server.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use omnibridge::bridge::ModelTransport;
use omnibridge::config::{Config, ModelServiceConfig};
use omnibridge::preprocess::{AudioPreprocessor, ImagePreprocessor, PreprocessError};
use omnibridge::{routes, AppState};

/// Test configuration constants
pub mod constants {
    /// Samples returned by the stub audio preprocessor
    pub const REFERENCE_SAMPLES: [f32; 4] = [0.0, 0.25, -0.25, 0.5];
    /// Bytes returned by the stub image preprocessor
    pub const REFERENCE_IMAGE: &[u8] = b"\x89PNG\r\n\x1a\nstub-image";
    /// Fake WAV payloads served by the mock model service
    pub const CLIP_A: &[u8] = b"RIFF-clip-a";
    pub const CLIP_B: &[u8] = b"RIFF-clip-b";
}

/// Configuration pointing at the given backend
pub fn test_config(model_service: ModelServiceConfig) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        model_service,
        static_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static"),
        ffmpeg_path: "/usr/bin/ffmpeg".into(),
        ffprobe_path: "/usr/bin/ffprobe".into(),
        max_upload_bytes: 10 * 1024 * 1024,
    }
}

/// Audio preprocessor returning fixed samples without touching ffmpeg
pub struct StubAudio;

#[async_trait]
impl AudioPreprocessor for StubAudio {
    async fn load(
        &self,
        _input: &Path,
        _work_dir: &Path,
        _sample_rate: u32,
    ) -> Result<Vec<f32>, PreprocessError> {
        Ok(constants::REFERENCE_SAMPLES.to_vec())
    }
}

/// Audio preprocessor rejecting every file
pub struct SilentAudio;

#[async_trait]
impl AudioPreprocessor for SilentAudio {
    async fn load(
        &self,
        _input: &Path,
        _work_dir: &Path,
        _sample_rate: u32,
    ) -> Result<Vec<f32>, PreprocessError> {
        Err(PreprocessError::NoAudioStream)
    }
}

/// Image preprocessor returning fixed bytes
pub struct StubImage;

#[async_trait]
impl ImagePreprocessor for StubImage {
    async fn load(&self, _input: &Path) -> Result<Vec<u8>, PreprocessError> {
        Ok(constants::REFERENCE_IMAGE.to_vec())
    }
}

/// Application state with stub preprocessors and the given transport
pub fn test_state(config: Config, transport: Arc<dyn ModelTransport>) -> Arc<AppState> {
    Arc::new(AppState::new_for_testing(
        config,
        transport,
        Arc::new(StubAudio),
        Arc::new(StubImage),
    ))
}

/// Test server over the full application router
pub fn test_server(state: Arc<AppState>) -> TestServer {
    TestServer::new(routes::create_router(state)).expect("Failed to create test server")
}

/// Hand-built `multipart/form-data` body
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "omnibridge-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    /// Add a file part
    pub fn file(mut self, name: &str, file_name: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Add a plain text part
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    /// Finish the body, returning its content type and bytes
    pub fn build(mut self) -> (String, Bytes) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            Bytes::from(self.body),
        )
    }
}
