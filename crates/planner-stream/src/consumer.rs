//! Folds a streamed generation response into a [`StreamState`].

use std::fmt;

use futures::{Stream, StreamExt as _};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::errors::ConsumeError;
use crate::record::{DEFAULT_TERMINAL_MARKER, LineDecoder, RawRecord, UnrecognizedReason, classify};
use crate::sink::ProgressSink;
use crate::state::StreamState;

/// Cooperative cancellation handle checked at every read.
pub type CancelToken = CancellationToken;

/// How a stream that did not fail ended.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ConsumeOutcome {
    /// End of stream reached. Carries the terminal payload, if one was seen.
    Completed(Option<serde_json::Value>),
    /// Cancellation was observed before end of stream.
    Cancelled,
}

impl ConsumeOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Tunables for record classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumerOptions {
    /// Substring a `{`-prefixed line must contain to count as the terminal
    /// payload.
    pub terminal_marker: String,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            terminal_marker: DEFAULT_TERMINAL_MARKER.to_string(),
        }
    }
}

impl ConsumerOptions {
    pub fn terminal_marker(mut self, marker: impl Into<String>) -> Self {
        self.terminal_marker = marker.into();
        self
    }
}

/// Consumes `body` with the default options.
///
/// See [`consume_with_options`].
pub async fn consume<S, B, E, K>(
    body: Option<S>,
    state: &mut StreamState,
    sink: &mut K,
    cancel: &CancelToken,
) -> Result<ConsumeOutcome, ConsumeError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: fmt::Display,
    K: ProgressSink + ?Sized,
{
    consume_with_options(body, state, sink, cancel, &ConsumerOptions::default()).await
}

/// Reads `body` chunk by chunk, applying each complete line to `state` and
/// reporting progress to `sink`.
///
/// `state` is reset when the body is opened, so one value can be reused
/// across streams.
///
/// Cancellation is checked before each read, raced against a pending read,
/// and re-checked before each line, so nothing is applied once it has been
/// observed. Malformed records are logged into `state.log_lines` and skipped.
/// A failed read ends the stream with [`ConsumeError::Transport`].
pub async fn consume_with_options<S, B, E, K>(
    body: Option<S>,
    state: &mut StreamState,
    sink: &mut K,
    cancel: &CancelToken,
    options: &ConsumerOptions,
) -> Result<ConsumeOutcome, ConsumeError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: fmt::Display,
    K: ProgressSink + ?Sized,
{
    let Some(mut body) = body else {
        return Err(ConsumeError::NoBody);
    };
    *state = StreamState::default();
    let mut decoder = LineDecoder::default();

    loop {
        if cancel.is_cancelled() {
            return Ok(cancelled(state));
        }
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(cancelled(state)),
            next = body.next() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                for line in decoder.push_chunk(chunk.as_ref()) {
                    if cancel.is_cancelled() {
                        return Ok(cancelled(state));
                    }
                    apply_line(&line, state, sink, options);
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "generation stream read failed");
                return Err(ConsumeError::Transport(e.to_string()));
            }
            None => break,
        }
    }

    if let Some(tail) = decoder.finish() {
        apply_line(&tail, state, sink, options);
    }
    state.mark_completed();
    debug!(
        log_lines = state.log_lines.len(),
        has_result = state.result.is_some(),
        "generation stream completed"
    );
    Ok(ConsumeOutcome::Completed(state.result.clone()))
}

fn cancelled(state: &mut StreamState) -> ConsumeOutcome {
    debug!(percent = state.progress_percent, "generation stream cancelled");
    state.mark_cancelled();
    ConsumeOutcome::Cancelled
}

fn apply_line<K>(line: &str, state: &mut StreamState, sink: &mut K, options: &ConsumerOptions)
where
    K: ProgressSink + ?Sized,
{
    let Some(record) = classify(line, &options.terminal_marker) else {
        return;
    };
    match record {
        RawRecord::Progress { value } => {
            state.progress_percent = value;
            sink.on_progress(value, None);
        }
        RawRecord::Message { text } => {
            sink.on_progress(state.progress_percent, Some(&text));
            state.push_log(text);
        }
        RawRecord::Terminal { json } => match serde_json::from_str::<serde_json::Value>(&json) {
            Ok(value) => {
                if !state.set_result_once(value) {
                    debug!("ignoring additional terminal record");
                }
            }
            Err(e) => {
                warn!(error = %e, "terminal record is not valid JSON");
                state.push_log(format!("Failed to parse plan payload: {e}"));
            }
        },
        RawRecord::Unrecognized {
            text,
            reason: UnrecognizedReason::BadProgressValue,
        } => {
            warn!(line = %text, "undecodable progress record");
            state.push_log(format!("Failed to decode progress value: {text}"));
        }
        RawRecord::Unrecognized {
            text,
            reason: UnrecognizedReason::UnknownPrefix,
        } => {
            trace!(line = %text, "ignoring unrecognized record");
        }
    }
}
