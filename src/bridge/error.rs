//! Error taxonomy for the model service bridge

use std::time::Duration;

use thiserror::Error;

/// Failures raised while encoding, exchanging or reconciling a bridge request
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A binary item outside the first turn, or more than one binary
    #[error("Invalid request content: {0}")]
    Encoding(String),

    #[error("Failed to connect to model service at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error talking to model service at {addr}: {source}")]
    Io {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Model service at {addr} timed out after {:.1} seconds", .timeout.as_secs_f64())]
    Timeout { addr: String, timeout: Duration },

    /// Peer closed the stream before a parseable document was accumulated
    #[error("Incomplete JSON response from model service at {addr} ({received} bytes received)")]
    IncompleteResponse { addr: String, received: usize },

    #[error("Response from model service at {addr} exceeded {limit} bytes")]
    ResponseTooLarge { addr: String, limit: usize },

    #[error("Model service error: {0}")]
    Application(String),

    #[error("Unexpected model service output: {0}")]
    Correlation(String),

    #[error("No valid outputs received across {repeats} repeat(s)")]
    NoValidOutputs { repeats: u32 },

    /// A fatal failure bound to the attempt that produced it
    #[error("Attempt {attempt}/{repeats} failed: {source}")]
    Attempt {
        attempt: u32,
        repeats: u32,
        #[source]
        source: Box<BridgeError>,
    },
}

impl BridgeError {
    /// Whether this failure originates from the byte-stream transport
    pub fn is_transport(&self) -> bool {
        match self {
            BridgeError::Connect { .. }
            | BridgeError::Io { .. }
            | BridgeError::Timeout { .. }
            | BridgeError::IncompleteResponse { .. }
            | BridgeError::ResponseTooLarge { .. } => true,
            BridgeError::Attempt { source, .. } => source.is_transport(),
            _ => false,
        }
    }

    /// Whether the attempt ran out of its time budget
    pub fn is_timeout(&self) -> bool {
        match self {
            BridgeError::Timeout { .. } => true,
            BridgeError::Attempt { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Innermost error with attempt wrappers peeled off
    pub fn root(&self) -> &BridgeError {
        match self {
            BridgeError::Attempt { source, .. } => source.root(),
            other => other,
        }
    }

    /// Short reason suitable for end callers, without addresses or causes
    pub fn summary(&self) -> String {
        match self.root() {
            BridgeError::Encoding(msg) => format!("Invalid request content: {}", msg),
            BridgeError::Connect { .. } => "Model service unreachable".to_string(),
            BridgeError::Io { .. } => "Connection to model service failed".to_string(),
            BridgeError::Timeout { timeout, .. } => format!(
                "Model service timeout after {:.1} seconds",
                timeout.as_secs_f64()
            ),
            BridgeError::IncompleteResponse { .. } => {
                "Incomplete response from model service".to_string()
            }
            BridgeError::ResponseTooLarge { .. } => {
                "Response from model service too large".to_string()
            }
            BridgeError::Application(msg) => format!("Model service error: {}", msg),
            BridgeError::Correlation(msg) => format!("Unexpected model service output: {}", msg),
            BridgeError::NoValidOutputs { .. } => {
                "No valid outputs received; check model service response".to_string()
            }
            BridgeError::Attempt { .. } => unreachable!("root() strips attempt wrappers"),
        }
    }

    pub(crate) fn in_attempt(self, attempt: u32, repeats: u32) -> Self {
        BridgeError::Attempt {
            attempt,
            repeats,
            source: Box::new(self),
        }
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
