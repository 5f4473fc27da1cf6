//! Voice mimicry endpoint
//!
//! `POST /voice-mimic/process_audio` takes a reference recording and a list
//! of texts, and returns one synthesized clip per text per successful repeat.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::upload::{parse_payload, stage_upload};
use crate::bridge::{BinaryPayload, BridgeRequest, BridgeResult, Message, RequestParams};
use crate::error::{AppError, AppResult};
use crate::AppState;

pub const AUDIO_FIELD: &str = "audio_file";

pub const DEFAULT_MIMICK_PROMPT: &str = "As a professional voice actor, mimic the voice style, pitch, tone, and speech patterns from reference file for the next message.";

/// Generation options forwarded to the model service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceParams {
    pub sampling: bool,
    pub max_new_tokens: u32,
    pub use_tts_template: bool,
    pub temperature: f64,
    pub generate_audio: bool,
    pub sample_rate: u32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            sampling: true,
            max_new_tokens: 128,
            use_tts_template: true,
            temperature: 0.3,
            generate_audio: true,
            sample_rate: 16000,
        }
    }
}

/// JSON carried in the `payload` form field
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceMimicPayload {
    pub input_mimick_text: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    #[serde(default = "default_true")]
    pub sampling: bool,
    #[serde(default = "default_true")]
    pub use_tts_template: bool,
    #[serde(default = "default_true")]
    pub generate_audio: bool,
    #[serde(default = "default_repeats")]
    pub repeats: u32,
    #[serde(default = "default_mimick_prompt")]
    pub mimick_prompt: String,
}

fn default_temperature() -> f64 {
    VoiceParams::default().temperature
}

fn default_sample_rate() -> u32 {
    VoiceParams::default().sample_rate
}

fn default_max_new_tokens() -> u32 {
    VoiceParams::default().max_new_tokens
}

fn default_true() -> bool {
    true
}

fn default_repeats() -> u32 {
    1
}

fn default_mimick_prompt() -> String {
    DEFAULT_MIMICK_PROMPT.to_string()
}

impl VoiceMimicPayload {
    pub fn validate(&self) -> AppResult<()> {
        if self.input_mimick_text.is_empty() {
            return Err(AppError::BadRequest(
                "input_mimick_text must contain at least one string".to_string(),
            ));
        }
        if self.repeats < 1 {
            return Err(AppError::BadRequest("repeats must be at least 1".to_string()));
        }
        if self.sample_rate == 0 {
            return Err(AppError::BadRequest("sample_rate must be positive".to_string()));
        }
        Ok(())
    }

    pub fn params(&self) -> VoiceParams {
        VoiceParams {
            sampling: self.sampling,
            max_new_tokens: self.max_new_tokens,
            use_tts_template: self.use_tts_template,
            temperature: self.temperature,
            generate_audio: self.generate_audio,
            sample_rate: self.sample_rate,
        }
    }
}

/// Build the bridge request: reference turn first, then one turn per text
pub fn build_request(
    prompt: &str,
    samples: &[f32],
    texts: &[String],
    params: &VoiceParams,
    repeats: u32,
) -> BridgeResult<BridgeRequest> {
    let mut messages = Vec::with_capacity(texts.len() + 1);
    messages.push(Message::reference(prompt, BinaryPayload::audio(samples)));
    messages.extend(texts.iter().map(|text| Message::user_text(text.as_str())));

    Ok(BridgeRequest::new(
        messages,
        RequestParams::from_serializable(params)?,
        repeats,
    ))
}

/// One synthesized clip
#[derive(Debug, Serialize, Deserialize)]
pub struct MimickedAudio {
    pub text: String,
    /// `data:audio/wav;base64,...` URL playable by a browser
    pub audio_data: String,
    pub index: usize,
    pub repeat: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoiceMimicMetadata {
    pub input_texts: Vec<String>,
    pub repeats: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoiceMimicResponse {
    pub status: String,
    pub files: Vec<MimickedAudio>,
    pub metadata: VoiceMimicMetadata,
}

/// Voice mimicry handler
pub async fn process_audio(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> AppResult<Json<VoiceMimicResponse>> {
    let upload = stage_upload(multipart, AUDIO_FIELD).await?;
    let payload: VoiceMimicPayload = parse_payload(&upload.payload)?;
    payload.validate()?;

    let params = payload.params();
    info!(
        texts = payload.input_mimick_text.len(),
        repeats = payload.repeats,
        params = ?params,
        "Voice mimic request"
    );

    let samples = state
        .audio
        .load(&upload.file, upload.dir.path(), params.sample_rate)
        .await?;

    let request = build_request(
        &payload.mimick_prompt,
        &samples,
        &payload.input_mimick_text,
        &params,
        payload.repeats,
    )?;
    let results = state.bridge.run_multi_output(&request).await?;

    let files = results
        .into_iter()
        .map(|result| MimickedAudio {
            text: result.input_text,
            audio_data: format!("data:audio/wav;base64,{}", BASE64.encode(&result.artifact)),
            index: result.input_index,
            repeat: result.repeat,
        })
        .collect();

    Ok(Json(VoiceMimicResponse {
        status: "success".to_string(),
        files,
        metadata: VoiceMimicMetadata {
            input_texts: payload.input_mimick_text,
            repeats: payload.repeats,
        },
    }))
}
