//! Voice mimicry endpoint integration tests
//!
//! POST /voice-mimic/process_audio through the full router, with the audio
//! preprocessor stubbed and the model service mocked over TCP.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use omnibridge::bridge::TcpTransport;
use omnibridge::routes::voice_mimic::{VoiceMimicResponse, DEFAULT_MIMICK_PROMPT};
use omnibridge::AppState;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::constants::{CLIP_A, CLIP_B};
use crate::common::{test_config, test_server, test_state, MultipartBody, SilentAudio, StubImage};
use crate::mocks::{refused_config, replies, Behavior, MockModelService};

const PATH: &str = "/voice-mimic/process_audio";
const TIMEOUT: Duration = Duration::from_secs(5);

fn upload(payload: &Value) -> (String, bytes::Bytes) {
    MultipartBody::new()
        .file("audio_file", "reference.wav", b"RIFF-reference")
        .text("payload", &payload.to_string())
        .build()
}

#[tokio::test]
async fn test_process_audio_success() {
    let mock = MockModelService::start(vec![
        Behavior::Reply(replies::files(&[("audio_0", CLIP_A), ("audio_1", CLIP_B)])),
        Behavior::Reply(replies::files(&[("output_audio_path_1", CLIP_B)])),
    ])
    .await;
    let config = test_config(mock.config(TIMEOUT));
    let server = test_server(test_state(config, mock.transport(TIMEOUT)));

    let (content_type, body) = upload(&json!({
        "input_mimick_text": ["Good morning", "Good night"],
        "repeats": 2,
        "temperature": 0.5
    }));
    let response = server.post(PATH).content_type(&content_type).bytes(body).await;

    response.assert_status_ok();
    let result: VoiceMimicResponse = response.json();
    assert_eq!(result.status, "success");
    assert_eq!(result.metadata.input_texts, vec!["Good morning", "Good night"]);
    assert_eq!(result.metadata.repeats, 2);

    let files: Vec<(u32, usize, &str)> = result
        .files
        .iter()
        .map(|f| (f.repeat, f.index, f.text.as_str()))
        .collect();
    assert_eq!(
        files,
        vec![(1, 0, "Good morning"), (1, 1, "Good night"), (2, 1, "Good night")]
    );

    let encoded = result.files[0]
        .audio_data
        .strip_prefix("data:audio/wav;base64,")
        .expect("Audio should be a WAV data URL");
    assert_eq!(BASE64.decode(encoded).unwrap(), CLIP_A);

    let requests = mock.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["messages"][0]["content"][0], DEFAULT_MIMICK_PROMPT);
    assert_eq!(
        requests[0]["params"],
        json!({
            "sampling": true,
            "max_new_tokens": 128,
            "use_tts_template": true,
            "temperature": 0.5,
            "generate_audio": true,
            "sample_rate": 16000
        })
    );
}

#[tokio::test]
async fn test_missing_payload_field() {
    let mock = MockModelService::start(Vec::new()).await;
    let server = test_server(test_state(
        test_config(mock.config(TIMEOUT)),
        mock.transport(TIMEOUT),
    ));

    let (content_type, body) = MultipartBody::new()
        .file("audio_file", "reference.wav", b"RIFF-reference")
        .build();
    let response = server.post(PATH).content_type(&content_type).bytes(body).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let error: Value = response.json();
    assert_eq!(error["error"]["code"], "BAD_REQUEST");
    assert_eq!(error["error"]["message"], "Missing payload field");
}

#[tokio::test]
async fn test_invalid_payload_rejected_before_backend() {
    let mock = MockModelService::start(Vec::new()).await;
    let server = test_server(test_state(
        test_config(mock.config(TIMEOUT)),
        mock.transport(TIMEOUT),
    ));

    for payload in [
        json!({"input_mimick_text": []}),
        json!({"input_mimick_text": ["hi"], "repeats": 0}),
        json!({"texts": ["wrong field"]}),
    ] {
        let (content_type, body) = upload(&payload);
        let response = server.post(PATH).content_type(&content_type).bytes(body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    assert!(mock.requests().await.is_empty());
}

#[tokio::test]
async fn test_unusable_audio() {
    let mock = MockModelService::start(Vec::new()).await;
    let state = Arc::new(AppState::new_for_testing(
        test_config(mock.config(TIMEOUT)),
        mock.transport(TIMEOUT),
        Arc::new(SilentAudio),
        Arc::new(StubImage),
    ));
    let server = test_server(state);

    let (content_type, body) = upload(&json!({"input_mimick_text": ["hi"]}));
    let response = server.post(PATH).content_type(&content_type).bytes(body).await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let error: Value = response.json();
    assert_eq!(error["error"]["code"], "INVALID_MEDIA");
}

#[tokio::test]
async fn test_no_valid_outputs() {
    let config = refused_config(TIMEOUT).await;
    let transport = Arc::new(TcpTransport::new(config.clone()));
    let server = test_server(test_state(test_config(config), transport));

    let (content_type, body) = upload(&json!({"input_mimick_text": ["hi"], "repeats": 2}));
    let response = server.post(PATH).content_type(&content_type).bytes(body).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let error: Value = response.json();
    assert_eq!(error["error"]["code"], "MODEL_SERVICE_ERROR");
    assert_eq!(
        error["error"]["message"],
        "No valid outputs received; check model service response"
    );
}
