//! Request model and wire encoding
//!
//! A request is a list of role/content turns. Content is either text or a
//! single binary reference payload attached to the first turn. Encoding turns
//! the binary into a `base64:`-prefixed string so the whole request becomes
//! one JSON document.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use serde_json::{Map, Value};

use super::error::{BridgeError, BridgeResult};

/// Prefix marking a base64-encoded binary string on the wire
pub const BASE64_PREFIX: &str = "base64:";

/// Role of a message turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// What a binary payload carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    /// Native-endian `f32` mono samples
    Audio,
    /// Encoded image stream (PNG or JPEG)
    Image,
}

impl fmt::Display for BinaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryKind::Audio => write!(f, "audio"),
            BinaryKind::Image => write!(f, "image"),
        }
    }
}

/// Raw bytes of the reference payload together with their kind
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryPayload {
    pub kind: BinaryKind,
    pub bytes: Vec<u8>,
}

impl BinaryPayload {
    /// Audio payload from a sample buffer, laid out as native-endian `f32` bytes
    pub fn audio(samples: &[f32]) -> Self {
        let bytes = samples.iter().flat_map(|s| s.to_ne_bytes()).collect();
        Self {
            kind: BinaryKind::Audio,
            bytes,
        }
    }

    /// Image payload from an already encoded image stream
    pub fn image(bytes: Vec<u8>) -> Self {
        Self {
            kind: BinaryKind::Image,
            bytes,
        }
    }

    fn to_wire(&self) -> String {
        format!("{}{}", BASE64_PREFIX, BASE64.encode(&self.bytes))
    }
}

/// One item of a turn's content
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text(String),
    Binary(BinaryPayload),
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text(text.into())
    }

    /// Log-friendly rendering: long texts are cut, binaries summarized
    pub fn preview(&self) -> String {
        match self {
            ContentItem::Text(text) if text.chars().count() > 100 => {
                format!("{}...", text.chars().take(100).collect::<String>())
            }
            ContentItem::Text(text) => text.clone(),
            ContentItem::Binary(payload) => match payload.kind {
                BinaryKind::Audio => format!("<audio {} samples>", payload.bytes.len() / 4),
                BinaryKind::Image => format!("<image {} bytes>", payload.bytes.len()),
            },
        }
    }
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentItem>,
}

impl Message {
    /// User turn carrying a prompt and the reference payload
    pub fn reference(prompt: impl Into<String>, payload: BinaryPayload) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentItem::text(prompt), ContentItem::Binary(payload)],
        }
    }

    /// Text-only user turn
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentItem::text(text)],
        }
    }

    /// Concatenated text content of this turn
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text(text) => Some(text.as_str()),
                ContentItem::Binary(_) => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Generation options forwarded verbatim to the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RequestParams(Map<String, Value>);

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option, replacing any previous value under the same name
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Build params from any serializable options struct
    pub fn from_serializable<T: Serialize>(options: &T) -> BridgeResult<Self> {
        match serde_json::to_value(options) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(BridgeError::Encoding(format!(
                "request params must serialize to an object, got {}",
                other
            ))),
            Err(e) => Err(BridgeError::Encoding(format!(
                "failed to serialize request params: {}",
                e
            ))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// Wire form of a message: every content item is a string
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: Vec<String>,
}

/// The request document sent once per attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub messages: Vec<WireMessage>,
    pub params: RequestParams,
}

impl Envelope {
    /// Serialize into the single JSON document written to the socket
    pub fn to_bytes(&self) -> BridgeResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| BridgeError::Encoding(format!("failed to serialize envelope: {}", e)))
    }
}

/// Encode a message list into an envelope
///
/// At most one binary item may exist and it must sit in the first turn.
pub fn encode(messages: &[Message], params: &RequestParams) -> BridgeResult<Envelope> {
    let mut binary_seen = false;
    let mut wire = Vec::with_capacity(messages.len());

    for (turn, message) in messages.iter().enumerate() {
        let mut content = Vec::with_capacity(message.content.len());
        for item in &message.content {
            match item {
                ContentItem::Text(text) => content.push(text.clone()),
                ContentItem::Binary(payload) => {
                    if turn != 0 {
                        return Err(BridgeError::Encoding(format!(
                            "{} payload found in turn {}; binaries belong to the first turn",
                            payload.kind, turn
                        )));
                    }
                    if binary_seen {
                        return Err(BridgeError::Encoding(
                            "more than one binary payload in request".to_string(),
                        ));
                    }
                    binary_seen = true;
                    content.push(payload.to_wire());
                }
            }
        }
        wire.push(WireMessage {
            role: message.role,
            content,
        });
    }

    Ok(Envelope {
        messages: wire,
        params: params.clone(),
    })
}
