//! Configuration management for Omnibridge
//!
//! Configuration is loaded from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Connection settings for the model service backend
#[derive(Debug, Clone)]
pub struct ModelServiceConfig {
    /// Backend host name or IP
    pub host: String,
    /// Backend TCP port
    pub port: u16,
    /// Cumulative budget for connect + write + read of one attempt
    pub timeout: Duration,
    /// Upper bound on an accumulated response before the attempt is aborted
    pub max_response_bytes: usize,
}

impl ModelServiceConfig {
    /// `host:port` form used for logging, with IPv6 literals bracketed
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Target handed to `TcpStream::connect`
    pub fn socket_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

impl Default for ModelServiceConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9999,
            timeout: Duration::from_secs(300),
            max_response_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Model service backend
    pub model_service: ModelServiceConfig,

    /// Directory holding index.html, favicon.ico and frontend assets
    pub static_dir: PathBuf,

    /// ffmpeg binary used for audio cleaning
    pub ffmpeg_path: PathBuf,
    /// ffprobe binary used for audio stream inspection
    pub ffprobe_path: PathBuf,

    /// Maximum accepted multipart body size
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let timeout_secs: f64 = env::var("MODEL_SERVICE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .context("Invalid MODEL_SERVICE_TIMEOUT_SECS")?;
        let timeout = Duration::try_from_secs_f64(timeout_secs)
            .context("MODEL_SERVICE_TIMEOUT_SECS must be a non-negative number of seconds")?;

        Ok(Self {
            host: env::var("OMNIBRIDGE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("OMNIBRIDGE_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("Invalid OMNIBRIDGE_PORT")?,

            model_service: ModelServiceConfig {
                host: env::var("MODEL_SERVICE_HOST")
                    .unwrap_or_else(|_| "localhost".to_string()),
                port: env::var("MODEL_SERVICE_PORT")
                    .unwrap_or_else(|_| "9999".to_string())
                    .parse()
                    .context("Invalid MODEL_SERVICE_PORT")?,
                timeout,
                max_response_bytes: env::var("MODEL_SERVICE_MAX_RESPONSE_BYTES")
                    .unwrap_or_else(|_| "536870912".to_string())
                    .parse()
                    .context("Invalid MODEL_SERVICE_MAX_RESPONSE_BYTES")?,
            },

            static_dir: env::var("OMNIBRIDGE_STATIC_DIR")
                .unwrap_or_else(|_| "static".to_string())
                .into(),

            ffmpeg_path: env::var("FFMPEG_PATH")
                .unwrap_or_else(|_| "/usr/bin/ffmpeg".to_string())
                .into(),
            ffprobe_path: env::var("FFPROBE_PATH")
                .unwrap_or_else(|_| "/usr/bin/ffprobe".to_string())
                .into(),

            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| "52428800".to_string())
                .parse()
                .context("Invalid MAX_UPLOAD_BYTES")?,
        })
    }
}
