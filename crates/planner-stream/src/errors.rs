/// Message surfaced when the server rejects a generation because the requested
/// plan version name is already taken (HTTP 409).
pub const CONFLICT_MESSAGE: &str = "a plan version with this name already exists";

/// Operation-level failures of the streaming consumer.
///
/// Malformed individual records are not errors; they are absorbed into the
/// stream log. Cancellation is not an error either, see
/// [`ConsumeOutcome::Cancelled`](crate::consumer::ConsumeOutcome::Cancelled).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsumeError {
    /// The response had no readable body.
    #[error("response has no readable body")]
    NoBody,
    /// Reading the body failed (connection drop, reset, etc.).
    #[error("stream transport error: {0}")]
    Transport(String),
}

/// Top-level error type for starting and running a plan generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input (blank project id, blank version name, ...).
    #[error("validation error: {0}")]
    Validation(String),
    /// The server answered 409 on initiation.
    #[error("{}", CONFLICT_MESSAGE)]
    Conflict,
    /// The server answered with any other non-2xx status.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// The request could not be sent or the response headers never arrived.
    #[error("transport error: {0}")]
    Transport(String),
    /// The stream was opened but consuming it failed.
    #[error(transparent)]
    Consume(#[from] ConsumeError),
    /// Internal misuse or invariant violation (e.g. the run task vanished).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl GenerateError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Human-readable message suitable for direct display.
    ///
    /// Conflicts keep their dedicated wording; server errors drop the raw
    /// response body.
    pub fn user_message(&self) -> String {
        match self {
            Self::Conflict => CONFLICT_MESSAGE.to_string(),
            Self::Server { status, .. } => {
                format!("the server failed to generate the plan (status {status})")
            }
            Self::Consume(ConsumeError::NoBody) => "the server returned an empty response".into(),
            Self::Consume(ConsumeError::Transport(message)) | Self::Transport(message) => {
                format!("connection problem: {message}")
            }
            Self::Config(message) | Self::Validation(message) | Self::Protocol(message) => {
                message.clone()
            }
        }
    }

    /// Returns `true` for the distinct 409 conflict outcome.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}
