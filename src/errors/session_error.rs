use thiserror::Error;

use crate::core::backend::BackendError;

/// Failures a session can run into.
///
/// None of these end the session except `IdleTimeout`. Backend failures abort
/// only the current turn, and teardown failures are logged and never sent to
/// the client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Undecodable control message; no state change
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Transport failure talking to STT, TTS or TTT
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A backend missed its deadline
    #[error("Backend timeout: {0}")]
    BackendTimeout(String),

    /// Frame not allowed in the current turn state
    #[error("Busy: {0}")]
    ProtocolViolation(String),

    /// Client sent nothing for too long; the session closes
    #[error("Idle timeout: {0}")]
    IdleTimeout(String),

    /// Failure while releasing resources on disconnect
    #[error("Teardown error: {0}")]
    TeardownError(String),
}

impl SessionError {
    /// Machine-readable code attached to client error events.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::MalformedInput(_) => "malformed_input",
            SessionError::BackendUnavailable(_) => "backend_unavailable",
            SessionError::BackendTimeout(_) => "backend_timeout",
            SessionError::ProtocolViolation(_) => "busy",
            SessionError::IdleTimeout(_) => "idle_timeout",
            SessionError::TeardownError(_) => "teardown",
        }
    }
}

impl From<BackendError> for SessionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Timeout(msg) => SessionError::BackendTimeout(msg),
            other => SessionError::BackendUnavailable(other.to_string()),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
