//! Repeat orchestration
//!
//! Runs the same encoded request once per repeat, strictly one after the
//! other, and reconciles the replies into per-input results.
//!
//! - Multi-output mode (voice mimicry) wants one audio artifact per target
//!   text. A failed repeat is logged and skipped; the request only fails when
//!   no repeat produced any artifact at all.
//! - Single-output mode (captioning) wants one description per prompt. Any
//!   failed repeat, missing output or count mismatch aborts the whole request.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::Instrument;

use super::context::{BridgeMode, ExchangeContext};
use super::error::{BridgeError, BridgeResult};
use super::message::{encode, Message, RequestParams, BASE64_PREFIX};
use super::response::{decode, ArtifactEntry, AttemptOutcome, ResponseDocument};
use super::transport::ModelTransport;

/// A logical request: the turns, the generation options and how often to run it
#[derive(Debug, Clone)]
pub struct BridgeRequest {
    /// First turn holds the reference payload, every later turn is one target
    pub messages: Vec<Message>,
    pub params: RequestParams,
    pub repeats: u32,
}

impl BridgeRequest {
    pub fn new(messages: Vec<Message>, params: RequestParams, repeats: u32) -> Self {
        Self {
            messages,
            params,
            repeats,
        }
    }

    /// Text of every turn after the reference turn, in order
    pub fn targets(&self) -> Vec<String> {
        self.messages.iter().skip(1).map(Message::text).collect()
    }
}

/// One output tied back to the input that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedResult<T> {
    /// 1-based repeat that produced this output
    pub repeat: u32,
    /// Position of the target among the non-reference turns
    pub input_index: usize,
    pub input_text: String,
    pub artifact: T,
}

/// Candidate `files` keys for target `index`, in probing order
pub fn artifact_keys(index: usize) -> [String; 4] {
    [
        format!("output_audio_path_{}", index),
        "output_audio_path".to_string(),
        format!("audio_{}", index),
        "audio".to_string(),
    ]
}

/// Probes one reply's `files` mapping for per-target artifacts
///
/// For each target the first candidate key present wins. An unindexed key
/// (`output_audio_path`, `audio`) carries a single artifact, so within one
/// reply it is attributed to the first target that reaches it only.
pub struct ArtifactLookup<'a> {
    files: &'a BTreeMap<String, ArtifactEntry>,
    claimed: BTreeSet<String>,
}

impl<'a> ArtifactLookup<'a> {
    pub fn new(files: &'a BTreeMap<String, ArtifactEntry>) -> Self {
        Self {
            files,
            claimed: BTreeSet::new(),
        }
    }

    /// Find the artifact for target `index`, returning the matched key
    pub fn find(&mut self, index: usize) -> Option<(String, &'a ArtifactEntry)> {
        let files = self.files;
        let (key, entry) = artifact_keys(index)
            .into_iter()
            .filter(|key| !self.claimed.contains(key))
            .find_map(|key| files.get(&key).map(|entry| (key, entry)))?;

        if !key.ends_with(&format!("_{}", index)) {
            self.claimed.insert(key.clone());
        }
        Some((key, entry))
    }
}

/// Decode an artifact entry into its raw bytes
pub fn decode_artifact(entry: &ArtifactEntry) -> Result<Vec<u8>, String> {
    let data = entry
        .data()
        .ok_or_else(|| "entry is neither a data object nor a string".to_string())?;
    let encoded = data
        .strip_prefix(BASE64_PREFIX)
        .ok_or_else(|| format!("data lacks the {:?} prefix", BASE64_PREFIX))?;
    BASE64
        .decode(encoded)
        .map_err(|e| format!("invalid base64 payload: {}", e))
}

/// Client side of the model service protocol
pub struct Bridge {
    transport: Arc<dyn ModelTransport>,
}

impl Bridge {
    pub fn new(transport: Arc<dyn ModelTransport>) -> Self {
        Self { transport }
    }

    pub fn addr(&self) -> String {
        self.transport.addr()
    }

    /// Check that the model service accepts connections
    pub async fn probe(&self, timeout: Duration) -> BridgeResult<()> {
        self.transport.probe(timeout).await
    }

    /// Run a request in multi-output mode, returning decoded audio artifacts
    pub async fn run_multi_output(
        &self,
        request: &BridgeRequest,
    ) -> BridgeResult<Vec<CorrelatedResult<Vec<u8>>>> {
        let ctx = ExchangeContext::new(BridgeMode::MultiOutput, self.addr(), request.repeats);
        let span = ctx.create_span();
        self.multi_output(request, &ctx).instrument(span).await
    }

    /// Run a request in single-output mode, returning one text per prompt per repeat
    pub async fn run_single_output(
        &self,
        request: &BridgeRequest,
    ) -> BridgeResult<Vec<CorrelatedResult<String>>> {
        let ctx = ExchangeContext::new(BridgeMode::SingleOutput, self.addr(), request.repeats);
        let span = ctx.create_span();
        self.single_output(request, &ctx).instrument(span).await
    }

    async fn multi_output(
        &self,
        request: &BridgeRequest,
        ctx: &ExchangeContext,
    ) -> BridgeResult<Vec<CorrelatedResult<Vec<u8>>>> {
        let wire = prepare(request, ctx)?;
        let targets = request.targets();
        let mut results = Vec::new();

        for attempt in 1..=request.repeats {
            let document = match self.attempt(&wire, ctx, attempt).await {
                AttemptOutcome::Success(document) => document,
                _ => {
                    ctx.log_attempt_skipped(attempt);
                    continue;
                }
            };

            let Some(files) = document.into_files() else {
                ctx.log_no_files(attempt);
                continue;
            };

            let mut lookup = ArtifactLookup::new(&files);
            for (index, text) in targets.iter().enumerate() {
                let Some((key, entry)) = lookup.find(index) else {
                    ctx.log_missing_artifact(attempt, index, text);
                    continue;
                };
                match decode_artifact(entry) {
                    Ok(artifact) => results.push(CorrelatedResult {
                        repeat: attempt,
                        input_index: index,
                        input_text: text.clone(),
                        artifact,
                    }),
                    Err(reason) => ctx.log_invalid_artifact(attempt, index, &key, &reason),
                }
            }
        }

        if results.is_empty() {
            let err = BridgeError::NoValidOutputs {
                repeats: request.repeats,
            };
            ctx.log_request_failed(&err);
            return Err(err);
        }

        ctx.log_request_complete(results.len());
        Ok(results)
    }

    async fn single_output(
        &self,
        request: &BridgeRequest,
        ctx: &ExchangeContext,
    ) -> BridgeResult<Vec<CorrelatedResult<String>>> {
        let wire = prepare(request, ctx)?;
        let targets = request.targets();
        let mut results = Vec::new();

        for attempt in 1..=request.repeats {
            let texts = self
                .attempt(&wire, ctx, attempt)
                .await
                .into_result()
                .and_then(|document| correlate_texts(&document, targets.len()))
                .map_err(|err| {
                    let err = err.in_attempt(attempt, request.repeats);
                    ctx.log_request_failed(&err);
                    err
                })?;

            results.extend(targets.iter().zip(texts).enumerate().map(
                |(index, (prompt, text))| CorrelatedResult {
                    repeat: attempt,
                    input_index: index,
                    input_text: prompt.clone(),
                    artifact: text,
                },
            ));
        }

        ctx.log_request_complete(results.len());
        Ok(results)
    }

    async fn attempt(&self, wire: &[u8], ctx: &ExchangeContext, attempt: u32) -> AttemptOutcome {
        ctx.log_attempt_start(attempt);
        let started = Instant::now();

        let outcome = match self.transport.exchange(wire).await {
            Ok(bytes) => decode(&bytes),
            Err(err) => AttemptOutcome::TransportFailure(err),
        };

        ctx.log_attempt_outcome(attempt, &outcome, started.elapsed());
        outcome
    }
}

/// Validate the request and serialize its envelope once for all repeats
fn prepare(request: &BridgeRequest, ctx: &ExchangeContext) -> BridgeResult<Vec<u8>> {
    let checked = if request.repeats == 0 {
        Err(BridgeError::Encoding("repeats must be at least 1".to_string()))
    } else if request.messages.is_empty() {
        Err(BridgeError::Encoding("request has no messages".to_string()))
    } else {
        encode(&request.messages, &request.params).and_then(|envelope| envelope.to_bytes())
    };

    match checked {
        Ok(wire) => {
            ctx.log_request_start(&request.messages, &request.params);
            Ok(wire)
        }
        Err(err) => {
            ctx.log_request_failed(&err);
            Err(err)
        }
    }
}

/// Pair the inline output positionally with `expected` prompts
fn correlate_texts(document: &ResponseDocument, expected: usize) -> BridgeResult<Vec<String>> {
    let texts = document
        .texts()
        .map_err(|e| BridgeError::Correlation(format!("unexpected response shape: {}", e)))?
        .ok_or_else(|| BridgeError::Correlation("no response data received".to_string()))?;

    if texts.len() != expected {
        return Err(BridgeError::Correlation(format!(
            "expected {} outputs for {} prompts, got {}",
            expected,
            expected,
            texts.len()
        )));
    }
    Ok(texts)
}
