//! Photo description endpoint
//!
//! `POST /describe-photo/process_photo` takes an image and a list of prompts
//! and returns one description per prompt per repeat.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::upload::{parse_payload, stage_upload};
use crate::bridge::{BinaryPayload, BridgeRequest, BridgeResult, Message, RequestParams};
use crate::error::{AppError, AppResult};
use crate::AppState;

pub const IMAGE_FIELD: &str = "image_file";

/// Prompt of the reference turn carrying the image
pub const DESCRIBE_PROMPT: &str = "Describe the image.";

/// Generation options forwarded to the model service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoParams {
    pub temperature: f64,
    pub max_new_tokens: u32,
}

impl Default for PhotoParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_new_tokens: 128,
        }
    }
}

/// JSON carried in the `payload` form field
#[derive(Debug, Clone, Deserialize)]
pub struct DescribePhotoPayload {
    pub prompts: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    #[serde(default = "default_repeats")]
    pub repeats: u32,
}

fn default_temperature() -> f64 {
    PhotoParams::default().temperature
}

fn default_max_new_tokens() -> u32 {
    PhotoParams::default().max_new_tokens
}

fn default_repeats() -> u32 {
    1
}

impl DescribePhotoPayload {
    pub fn validate(&self) -> AppResult<()> {
        if self.prompts.is_empty() {
            return Err(AppError::BadRequest(
                "prompts must contain at least one string".to_string(),
            ));
        }
        if self.repeats < 1 {
            return Err(AppError::BadRequest("repeats must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn params(&self) -> PhotoParams {
        PhotoParams {
            temperature: self.temperature,
            max_new_tokens: self.max_new_tokens,
        }
    }
}

/// Build the bridge request: image turn first, then one turn per prompt
pub fn build_request(
    image: Vec<u8>,
    prompts: &[String],
    params: &PhotoParams,
    repeats: u32,
) -> BridgeResult<BridgeRequest> {
    let mut messages = Vec::with_capacity(prompts.len() + 1);
    messages.push(Message::reference(DESCRIBE_PROMPT, BinaryPayload::image(image)));
    messages.extend(prompts.iter().map(|prompt| Message::user_text(prompt.as_str())));

    Ok(BridgeRequest::new(
        messages,
        RequestParams::from_serializable(params)?,
        repeats,
    ))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PhotoDescription {
    pub prompt: String,
    pub description: String,
    pub index: usize,
    pub repeat: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DescribePhotoMetadata {
    pub prompts: Vec<String>,
    pub repeats: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DescribePhotoResponse {
    pub status: String,
    pub descriptions: Vec<PhotoDescription>,
    pub metadata: DescribePhotoMetadata,
}

/// Photo description handler
pub async fn process_photo(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> AppResult<Json<DescribePhotoResponse>> {
    let upload = stage_upload(multipart, IMAGE_FIELD).await?;
    let payload: DescribePhotoPayload = parse_payload(&upload.payload)?;
    payload.validate()?;

    let params = payload.params();
    info!(
        prompts = payload.prompts.len(),
        repeats = payload.repeats,
        params = ?params,
        "Describe photo request"
    );

    let image = state.image.load(&upload.file).await?;
    let request = build_request(image, &payload.prompts, &params, payload.repeats)?;
    let results = state.bridge.run_single_output(&request).await?;

    let descriptions = results
        .into_iter()
        .map(|result| PhotoDescription {
            prompt: result.input_text,
            description: result.artifact,
            index: result.input_index,
            repeat: result.repeat,
        })
        .collect();

    Ok(Json(DescribePhotoResponse {
        status: "success".to_string(),
        descriptions,
        metadata: DescribePhotoMetadata {
            prompts: payload.prompts,
            repeats: payload.repeats,
        },
    }))
}
