use std::fmt;

use crate::consumer::ConsumeOutcome;
use crate::errors::GenerateError;

/// Log line appended when a stream is cancelled.
pub const CANCELLED_LOG_LINE: &str = "Generation cancelled";

/// Progress state folded from one generation stream.
///
/// Owned by a single in-flight generation; a new generation starts from
/// `StreamState::default()`.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StreamState {
    /// Last progress value seen, `0..=100`. Not forced to be monotonic.
    pub progress_percent: u8,
    /// Append-only log in display order.
    pub log_lines: Vec<String>,
    /// Terminal plan payload, set at most once.
    pub result: Option<serde_json::Value>,
    /// Set once cancellation has been observed.
    pub cancelled: bool,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_log(&mut self, line: impl Into<String>) {
        self.log_lines.push(line.into());
    }

    /// Stores the terminal payload unless one is already present.
    ///
    /// Returns `true` if the value was stored.
    pub fn set_result_once(&mut self, value: serde_json::Value) -> bool {
        if self.result.is_some() {
            return false;
        }
        self.result = Some(value);
        true
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
        self.push_log(CANCELLED_LOG_LINE);
    }

    pub(crate) fn mark_completed(&mut self) {
        self.progress_percent = 100;
    }
}

/// The four mutually exclusive displays of a generation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationStatus {
    InProgress { percent: u8 },
    Cancelled,
    Failed { message: String },
    Succeeded { payload: Option<serde_json::Value> },
}

impl GenerationStatus {
    /// Maps a finished run into its final display.
    pub fn from_result(result: &Result<ConsumeOutcome, GenerateError>) -> Self {
        match result {
            Ok(ConsumeOutcome::Completed(payload)) => Self::Succeeded {
                payload: payload.clone(),
            },
            Ok(ConsumeOutcome::Cancelled) => Self::Cancelled,
            Err(err) => Self::Failed {
                message: err.user_message(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress { .. })
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress { percent } => write!(f, "in progress ({percent}%)"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Failed { message } => write!(f, "failed: {message}"),
            Self::Succeeded { .. } => f.write_str("succeeded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CONFLICT_MESSAGE;

    #[test]
    fn first_result_wins() {
        let mut state = StreamState::new();
        assert!(state.set_result_once(serde_json::json!({"content": "a"})));
        assert!(!state.set_result_once(serde_json::json!({"content": "b"})));
        assert_eq!(state.result, Some(serde_json::json!({"content": "a"})));
    }

    #[test]
    fn cancel_appends_log_line_and_keeps_progress() {
        let mut state = StreamState {
            progress_percent: 30,
            ..StreamState::default()
        };
        state.mark_cancelled();
        assert!(state.cancelled);
        assert_eq!(state.progress_percent, 30);
        assert_eq!(state.log_lines, vec![CANCELLED_LOG_LINE]);
    }

    #[test]
    fn status_covers_each_final_display() {
        let ok = GenerationStatus::from_result(&Ok(ConsumeOutcome::Completed(None)));
        assert_eq!(ok, GenerationStatus::Succeeded { payload: None });
        let cancelled = GenerationStatus::from_result(&Ok(ConsumeOutcome::Cancelled));
        assert_eq!(cancelled.to_string(), "cancelled");
        let failed = GenerationStatus::from_result(&Err(GenerateError::Conflict));
        assert_eq!(failed.to_string(), format!("failed: {CONFLICT_MESSAGE}"));
        assert!(failed.is_terminal());
        assert!(!GenerationStatus::InProgress { percent: 5 }.is_terminal());
    }
}
