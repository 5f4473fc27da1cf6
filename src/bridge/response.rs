//! Response document decoding
//!
//! Classifies a raw reply into success, application failure or malformed
//! content. The output carriers (`response`, `files`) are kept as received;
//! interpreting them depends on the call site and is left to the orchestrator.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::error::BridgeError;

/// Status marker of a successful reply
pub const SUCCESS_STATUS: &str = "success";

/// Inline text output: one string or one string per prompt
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ResponseText {
    One(String),
    Many(Vec<String>),
}

impl ResponseText {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ResponseText::One(text) => vec![text],
            ResponseText::Many(texts) => texts,
        }
    }
}

/// One entry of the `files` mapping
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ArtifactEntry {
    /// `{"data": "base64:..."}`
    Wrapped { data: String },
    /// `"base64:..."`
    Bare(String),
    /// Anything else the backend put under a file key
    Other(Value),
}

impl ArtifactEntry {
    /// The encoded payload string, whichever of the two accepted forms carries it
    pub fn data(&self) -> Option<&str> {
        match self {
            ArtifactEntry::Wrapped { data } => Some(data),
            ArtifactEntry::Bare(data) => Some(data),
            ArtifactEntry::Other(_) => None,
        }
    }
}

/// A reply whose status is the success marker
///
/// `response` and `files` stay raw JSON; each mode reads only the carrier it
/// needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseDocument {
    pub status: String,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub files: Option<Value>,
}

impl ResponseDocument {
    /// Inline text outputs, `Ok(None)` when the reply has none
    pub fn texts(&self) -> Result<Option<Vec<String>>, serde_json::Error> {
        self.response
            .as_ref()
            .map(|response| ResponseText::deserialize(response).map(ResponseText::into_vec))
            .transpose()
    }

    /// The `files` mapping, `None` when absent or not an object
    pub fn into_files(self) -> Option<BTreeMap<String, ArtifactEntry>> {
        self.files.and_then(|files| serde_json::from_value(files).ok())
    }
}

/// Classified result of one attempt
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(ResponseDocument),
    TransportFailure(BridgeError),
    ApplicationFailure(String),
}

impl AttemptOutcome {
    /// Outcome label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::TransportFailure(_) => "transport_failure",
            AttemptOutcome::ApplicationFailure(_) => "application_failure",
        }
    }

    /// Collapse into a result, turning both failure kinds into errors
    pub fn into_result(self) -> Result<ResponseDocument, BridgeError> {
        match self {
            AttemptOutcome::Success(document) => Ok(document),
            AttemptOutcome::TransportFailure(err) => Err(err),
            AttemptOutcome::ApplicationFailure(reason) => Err(BridgeError::Application(reason)),
        }
    }
}

/// Decode a raw reply
pub fn decode(bytes: &[u8]) -> AttemptOutcome {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(_) => return AttemptOutcome::ApplicationFailure("malformed response".to_string()),
    };

    let Value::Object(map) = &value else {
        return AttemptOutcome::ApplicationFailure("malformed response".to_string());
    };

    if let Some(error) = map.get("error") {
        let message = match error {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        };
        return AttemptOutcome::ApplicationFailure(message);
    }

    if map.get("status").and_then(Value::as_str) != Some(SUCCESS_STATUS) {
        return AttemptOutcome::ApplicationFailure(format!("processing failed: {}", value));
    }

    match serde_json::from_value(value) {
        Ok(document) => AttemptOutcome::Success(document),
        Err(e) => AttemptOutcome::ApplicationFailure(format!("malformed response: {}", e)),
    }
}
