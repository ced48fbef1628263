use crate::errors::{ClientError, RunFailure};

/// Normalized events yielded by `RunStream`.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// First event for every run.
    RunStarted { run_id: uuid::Uuid, agent_id: String },
    /// Incremental answer text, in wire order.
    OutputDelta {
        run_id: uuid::Uuid,
        seq: u64,
        text: String,
    },
    /// Terminal success event with the accumulated answer.
    Completed { run_id: uuid::Uuid, text: String },
    /// Terminal failure event. `partial` holds whatever answer text was
    /// accumulated before the failure; it stands and is never replayed.
    Error {
        run_id: uuid::Uuid,
        error: RunFailure,
        partial: String,
    },
}

/// Terminal status of a finished run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed(RunFailure),
}

/// Final result of a run: the accumulated answer plus its terminal status.
///
/// A failed run still carries the partial answer accumulated before the
/// failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    pub text: String,
    pub status: RunStatus,
}

impl RunOutcome {
    pub(crate) fn completed(text: String) -> Self {
        Self {
            text,
            status: RunStatus::Completed,
        }
    }

    pub(crate) fn failed(text: String, failure: RunFailure) -> Self {
        Self {
            text,
            status: RunStatus::Failed(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Converts to a strict result, discarding partial text on failure.
    pub fn into_result(self) -> Result<String, ClientError> {
        match self.status {
            RunStatus::Completed => Ok(self.text),
            RunStatus::Failed(failure) => Err(ClientError::RunFailed(failure)),
        }
    }
}
