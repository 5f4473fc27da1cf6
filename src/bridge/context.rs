//! Exchange logging
//!
//! Provides structured logging with correlation IDs for tracing one bridge
//! request through all of its repeats.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn, Span};
use uuid::Uuid;

use super::error::BridgeError;
use super::message::{Message, RequestParams};
use super::response::AttemptOutcome;
use crate::routes::metrics::{record_artifacts, record_attempt};

/// How a bridge request reconciles its repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    /// One artifact per target, failed repeats tolerated
    MultiOutput,
    /// One text per prompt, any failure is fatal
    SingleOutput,
}

impl BridgeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeMode::MultiOutput => "multi_output",
            BridgeMode::SingleOutput => "single_output",
        }
    }
}

impl fmt::Display for BridgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context for tracking one bridge request across its attempts
#[derive(Debug, Clone)]
pub struct ExchangeContext {
    /// Short identifier for log correlation
    pub trace_id: String,
    pub mode: BridgeMode,
    /// Backend address
    pub addr: String,
    pub repeats: u32,
    pub start_time: Instant,
}

impl ExchangeContext {
    pub fn new(mode: BridgeMode, addr: impl Into<String>, repeats: u32) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string()[..8].to_string(),
            mode,
            addr: addr.into(),
            repeats,
            start_time: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }

    /// Log the request parameters and a preview of every turn
    pub fn log_request_start(&self, messages: &[Message], params: &RequestParams) {
        info!(
            trace_id = %self.trace_id,
            mode = %self.mode,
            addr = %self.addr,
            repeats = self.repeats,
            turns = messages.len(),
            "Bridge request started"
        );
        for (name, value) in params.iter() {
            debug!(trace_id = %self.trace_id, param = %name, value = %value, "Request parameter");
        }
        for (turn, message) in messages.iter().enumerate() {
            let content: Vec<String> = message.content.iter().map(|c| c.preview()).collect();
            debug!(
                trace_id = %self.trace_id,
                turn,
                role = ?message.role,
                content = ?content,
                "Message to be sent to model service"
            );
        }
    }

    pub fn log_attempt_start(&self, attempt: u32) {
        info!(
            trace_id = %self.trace_id,
            mode = %self.mode,
            attempt,
            repeats = self.repeats,
            "Processing repeat"
        );
    }

    /// Log an attempt's classified outcome and record it in metrics
    pub fn log_attempt_outcome(&self, attempt: u32, outcome: &AttemptOutcome, duration: Duration) {
        record_attempt(self.mode.as_str(), outcome.label(), duration.as_secs_f64());

        match outcome {
            AttemptOutcome::Success(_) => info!(
                trace_id = %self.trace_id,
                attempt,
                repeats = self.repeats,
                duration_ms = duration.as_millis() as u64,
                "Received response from model service"
            ),
            AttemptOutcome::TransportFailure(err) => error!(
                trace_id = %self.trace_id,
                addr = %self.addr,
                attempt,
                repeats = self.repeats,
                duration_ms = duration.as_millis() as u64,
                error = %err,
                "Failed to reach model service"
            ),
            AttemptOutcome::ApplicationFailure(reason) => error!(
                trace_id = %self.trace_id,
                addr = %self.addr,
                attempt,
                repeats = self.repeats,
                reason = %reason,
                "Model service reported failure"
            ),
        }
    }

    pub fn log_attempt_skipped(&self, attempt: u32) {
        warn!(
            trace_id = %self.trace_id,
            attempt,
            repeats = self.repeats,
            "Skipping repeat after failure"
        );
    }

    pub fn log_no_files(&self, attempt: u32) {
        warn!(
            trace_id = %self.trace_id,
            attempt,
            repeats = self.repeats,
            "No files in response from model service"
        );
    }

    pub fn log_missing_artifact(&self, attempt: u32, index: usize, text: &str) {
        warn!(
            trace_id = %self.trace_id,
            attempt,
            index,
            text = %text,
            "No valid artifact for target"
        );
    }

    pub fn log_invalid_artifact(&self, attempt: u32, index: usize, key: &str, reason: &str) {
        warn!(
            trace_id = %self.trace_id,
            attempt,
            index,
            key = %key,
            reason = %reason,
            "Rejected artifact for target"
        );
    }

    pub fn log_request_complete(&self, results: usize) {
        record_artifacts(self.mode.as_str(), results as u64);
        info!(
            trace_id = %self.trace_id,
            mode = %self.mode,
            results,
            repeats = self.repeats,
            elapsed_ms = %self.elapsed_ms(),
            "Bridge request completed"
        );
    }

    pub fn log_request_failed(&self, err: &BridgeError) {
        error!(
            trace_id = %self.trace_id,
            mode = %self.mode,
            addr = %self.addr,
            repeats = self.repeats,
            elapsed_ms = %self.elapsed_ms(),
            error = %err,
            "Bridge request failed"
        );
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "bridge_request",
            trace_id = %self.trace_id,
            mode = %self.mode,
            addr = %self.addr,
            repeats = self.repeats,
        )
    }
}
