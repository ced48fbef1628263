/// Errors raised by the byte transport while establishing or reading a
/// streaming response, before they are normalized for the public run stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established (DNS, TCP, TLS, request I/O).
    #[error("connect error: {0}")]
    Connect(String),
    /// The request timed out before a response was established.
    #[error("timeout: {0}")]
    Timeout(String),
    /// The server answered with a non-success HTTP status.
    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },
    /// Reading the response body failed after the stream was established.
    #[error("read error: {0}")]
    Read(String),
    /// All connection attempts failed with transient errors.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<TransportError>,
    },
}

impl TransportError {
    /// Whether this failure may succeed on a fresh connection attempt.
    ///
    /// Only establishment-phase failures qualify; a stream that errored after
    /// delivering bytes must never be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout(_))
    }
}

/// Terminal run failure delivered through `StreamEvent::Error` and
/// `RunStatus::Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum RunFailure {
    /// Every connection attempt failed before a stream was established.
    #[error("connection attempts exhausted: {message}")]
    Exhausted { message: String },
    /// The stream could not be established for a non-retryable reason.
    #[error("connection failed: {message}")]
    Connect { message: String },
    /// The stream failed after it was established; partial output stands.
    #[error("stream failure: {message}")]
    Stream { message: String },
    /// The run was cancelled by the caller.
    #[error("run cancelled")]
    Cancelled,
    /// The client detected an internal invariant violation.
    #[error("protocol failure: {message}")]
    Protocol { message: String },
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input to the builder API.
    #[error("validation error: {0}")]
    Validation(String),
    /// Transport error surfaced outside a started run.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Terminal failure returned from a started run.
    #[error(transparent)]
    RunFailed(RunFailure),
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<RunFailure> for ClientError {
    fn from(value: RunFailure) -> Self {
        ClientError::RunFailed(value)
    }
}

/// Maps an establishment-phase transport error to its terminal run failure.
pub(crate) fn establish_failure(err: &TransportError) -> RunFailure {
    match err {
        TransportError::Exhausted { .. } => RunFailure::Exhausted {
            message: err.to_string(),
        },
        other => RunFailure::Connect {
            message: other.to_string(),
        },
    }
}
