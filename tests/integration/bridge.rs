//! Bridge integration tests over real TCP
//!
//! Drives `Bridge` through `TcpTransport` against the scripted mock model
//! service: framing across split writes, truncated replies, silent backends,
//! refused connections and the repeat policies of both modes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use omnibridge::bridge::{
    BinaryPayload, Bridge, BridgeError, BridgeRequest, Message, RequestParams, TcpTransport,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::constants::{CLIP_A, CLIP_B, REFERENCE_SAMPLES};
use crate::mocks::{refused_config, replies, Behavior, MockModelService};

const TIMEOUT: Duration = Duration::from_secs(5);

fn voice_request(texts: &[&str], repeats: u32) -> BridgeRequest {
    let mut messages = vec![Message::reference(
        "Mimic the reference voice.",
        BinaryPayload::audio(&REFERENCE_SAMPLES),
    )];
    messages.extend(texts.iter().map(|text| Message::user_text(*text)));
    BridgeRequest::new(
        messages,
        RequestParams::new()
            .with("temperature", 0.3)
            .with("sample_rate", 16000),
        repeats,
    )
}

fn caption_request(prompts: &[&str], repeats: u32) -> BridgeRequest {
    let mut messages = vec![Message::reference(
        "Describe the image.",
        BinaryPayload::image(b"\x89PNG-bytes".to_vec()),
    )];
    messages.extend(prompts.iter().map(|prompt| Message::user_text(*prompt)));
    BridgeRequest::new(messages, RequestParams::new().with("max_new_tokens", 64), repeats)
}

#[tokio::test]
async fn test_wire_request_shape() {
    let mock = MockModelService::start(vec![Behavior::Reply(replies::files(&[(
        "audio_0", CLIP_A,
    )]))])
    .await;
    let bridge = Bridge::new(mock.transport(TIMEOUT));

    bridge
        .run_multi_output(&voice_request(&["Hello"], 1))
        .await
        .expect("Bridge request should succeed");

    let requests = mock.requests().await;
    assert_eq!(requests.len(), 1);

    let request = &requests[0];
    assert_eq!(request["params"], json!({"temperature": 0.3, "sample_rate": 16000}));
    assert_eq!(request["messages"][0]["role"], "user");
    assert_eq!(request["messages"][0]["content"][0], "Mimic the reference voice.");
    assert_eq!(request["messages"][1], json!({"role": "user", "content": ["Hello"]}));

    let audio = request["messages"][0]["content"][1]
        .as_str()
        .and_then(|s| s.strip_prefix("base64:"))
        .expect("Reference audio should be base64-prefixed");
    let expected: Vec<u8> = REFERENCE_SAMPLES.iter().flat_map(|s| s.to_ne_bytes()).collect();
    assert_eq!(BASE64.decode(audio).unwrap(), expected);
}

#[tokio::test]
async fn test_reply_split_into_small_writes() {
    let reply = replies::files(&[("output_audio_path_0", CLIP_A), ("output_audio_path_1", CLIP_B)]);
    let mock = MockModelService::start(vec![Behavior::ReplySplit(reply, 7)]).await;
    let bridge = Bridge::new(mock.transport(TIMEOUT));

    let results = bridge
        .run_multi_output(&voice_request(&["first", "second"], 1))
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].artifact, CLIP_A);
    assert_eq!(results[1].artifact, CLIP_B);
    assert_eq!(results[1].input_text, "second");
}

#[tokio::test]
async fn test_one_connection_per_repeat() {
    let reply = replies::files(&[("audio_0", CLIP_A)]);
    let mock = MockModelService::start(vec![
        Behavior::Reply(reply.clone()),
        Behavior::Reply(reply.clone()),
        Behavior::Reply(reply),
    ])
    .await;
    let bridge = Bridge::new(mock.transport(TIMEOUT));

    let results = bridge
        .run_multi_output(&voice_request(&["again"], 3))
        .await
        .unwrap();

    let repeats: Vec<u32> = results.iter().map(|r| r.repeat).collect();
    assert_eq!(repeats, vec![1, 2, 3]);

    let requests = mock.requests().await;
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r == &requests[0]));
}

#[tokio::test]
async fn test_mixed_repeats_in_multi_output_mode() {
    let mock = MockModelService::start(vec![
        Behavior::CloseEarly(Vec::new()),
        Behavior::Reply(replies::files(&[("audio_0", CLIP_A), ("audio_1", CLIP_B)])),
        Behavior::Reply(replies::files(&[("output_audio_path", CLIP_B)])),
    ])
    .await;
    let bridge = Bridge::new(mock.transport(TIMEOUT));

    let results = bridge
        .run_multi_output(&voice_request(&["zero", "one"], 3))
        .await
        .unwrap();

    let correlated: Vec<(u32, usize)> = results.iter().map(|r| (r.repeat, r.input_index)).collect();
    assert_eq!(correlated, vec![(2, 0), (2, 1), (3, 0)]);
}

#[tokio::test]
async fn test_truncated_reply_is_incomplete() {
    let mock = MockModelService::start(vec![Behavior::CloseEarly(
        br#"{"status": "success", "response": ["A ca"#.to_vec(),
    )])
    .await;
    let bridge = Bridge::new(mock.transport(TIMEOUT));

    let err = bridge
        .run_single_output(&caption_request(&["What is it?"], 1))
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert!(matches!(
        err.root(),
        BridgeError::IncompleteResponse { received, .. } if *received > 0
    ));
}

#[tokio::test]
async fn test_silent_backend_times_out() {
    let timeout = Duration::from_millis(300);
    let mock = MockModelService::start(vec![Behavior::Hang]).await;
    let bridge = Bridge::new(mock.transport(timeout));

    let started = Instant::now();
    let err = bridge
        .run_single_output(&caption_request(&["Anyone there?"], 1))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout());
    assert!(elapsed >= timeout, "failed after {:?}", elapsed);
    assert!(elapsed < timeout + Duration::from_millis(1500), "failed after {:?}", elapsed);
}

#[tokio::test]
async fn test_refused_connection() {
    let transport = Arc::new(TcpTransport::new(refused_config(TIMEOUT).await));
    let bridge = Bridge::new(transport);

    let multi = bridge
        .run_multi_output(&voice_request(&["hello"], 2))
        .await
        .unwrap_err();
    assert!(matches!(multi, BridgeError::NoValidOutputs { repeats: 2 }));

    let single = bridge
        .run_single_output(&caption_request(&["hello"], 2))
        .await
        .unwrap_err();
    assert!(matches!(
        &single,
        BridgeError::Attempt { attempt: 1, repeats: 2, source } if matches!(**source, BridgeError::Connect { .. })
    ));
}

#[tokio::test]
async fn test_single_output_repeats() {
    let mock = MockModelService::start(vec![
        Behavior::Reply(replies::texts(&["A cat.", "Grey."])),
        Behavior::Reply(replies::texts(&["A kitten.", "Silver."])),
    ])
    .await;
    let bridge = Bridge::new(mock.transport(TIMEOUT));

    let results = bridge
        .run_single_output(&caption_request(&["What animal?", "What color?"], 2))
        .await
        .unwrap();

    let outputs: Vec<(u32, &str, &str)> = results
        .iter()
        .map(|r| (r.repeat, r.input_text.as_str(), r.artifact.as_str()))
        .collect();
    assert_eq!(
        outputs,
        vec![
            (1, "What animal?", "A cat."),
            (1, "What color?", "Grey."),
            (2, "What animal?", "A kitten."),
            (2, "What color?", "Silver."),
        ]
    );
}

#[tokio::test]
async fn test_single_output_mismatch_discards_earlier_repeats() {
    let mock = MockModelService::start(vec![
        Behavior::Reply(replies::texts(&["A cat.", "Grey."])),
        Behavior::Reply(replies::texts(&["A kitten."])),
    ])
    .await;
    let bridge = Bridge::new(mock.transport(TIMEOUT));

    let err = bridge
        .run_single_output(&caption_request(&["What animal?", "What color?"], 2))
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        BridgeError::Attempt { attempt: 2, source, .. } if matches!(**source, BridgeError::Correlation(_))
    ));
}

#[tokio::test]
async fn test_backend_error_string_surfaces() {
    let mock =
        MockModelService::start(vec![Behavior::Reply(replies::error("CUDA out of memory"))]).await;
    let bridge = Bridge::new(mock.transport(TIMEOUT));

    let err = bridge
        .run_single_output(&caption_request(&["What is it?"], 1))
        .await
        .unwrap_err();

    assert_eq!(err.summary(), "Model service error: CUDA out of memory");
}

#[tokio::test]
async fn test_probe() {
    let mock = MockModelService::start(Vec::new()).await;
    let bridge = Bridge::new(mock.transport(TIMEOUT));
    assert!(bridge.probe(Duration::from_secs(1)).await.is_ok());

    let refused = Bridge::new(Arc::new(TcpTransport::new(refused_config(TIMEOUT).await)));
    assert!(refused.probe(Duration::from_secs(1)).await.is_err());
}

async fn assert_drop_closes_connection<F>(mock: &MockModelService, run: F)
where
    F: std::future::Future,
{
    let outcome = tokio::time::timeout(Duration::from_millis(300), run).await;
    assert!(outcome.is_err(), "request should still be in flight");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(mock.requests().await.len(), 1);
    assert_eq!(mock.closed_connections(), 1);
}

#[tokio::test]
async fn test_dropped_multi_output_request_stops_repeats() {
    let mock = MockModelService::start(vec![Behavior::HangUntilClosed, Behavior::HangUntilClosed])
        .await;
    let bridge = Bridge::new(mock.transport(TIMEOUT));
    let request = voice_request(&["Hello"], 2);

    assert_drop_closes_connection(&mock, bridge.run_multi_output(&request)).await;
}

#[tokio::test]
async fn test_dropped_single_output_request_stops_repeats() {
    let mock = MockModelService::start(vec![Behavior::HangUntilClosed, Behavior::HangUntilClosed])
        .await;
    let bridge = Bridge::new(mock.transport(TIMEOUT));
    let request = caption_request(&["What is this?"], 2);

    assert_drop_closes_connection(&mock, bridge.run_single_output(&request)).await;
}
