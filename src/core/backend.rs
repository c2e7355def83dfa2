//! Backend capability traits and error types.
//!
//! The gateway talks to three independent inference services. Two of them
//! (speech recognition and speech synthesis) are duplex streams that differ
//! only in payload type, so they share the [`StreamingBackend`] capability.
//! The answer-retrieval service is a plain request/response call behind
//! [`QueryBackend`].
//!
//! Concrete gRPC implementations live in the `stt`, `tts` and `ttt` modules;
//! tests substitute in-process mocks through [`BackendConnector`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use super::streaming::StreamFrame;
use super::stt::SpeechBackend;
use super::tts::SynthesisBackend;

/// Errors raised while talking to an inference backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Transport-level failure (connection refused, stream reset, channel released)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The backend did not answer within its deadline
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Endpoint or client configuration is invalid
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    /// The backend answered with an application-level error
    #[error("Provider error: {0}")]
    ProviderError(String),
}

impl BackendError {
    /// Whether the error is a deadline expiry rather than a transport failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout(_))
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Identifies which backend an adapter or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Speech-to-text recognition
    Stt,
    /// Text-to-speech synthesis
    Tts,
    /// Text-to-text answer retrieval
    Ttt,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Stt => "stt",
            BackendKind::Tts => "tts",
            BackendKind::Ttt => "ttt",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound half of a duplex call: frames pulled by the remote call.
pub type RequestStream<T> = BoxStream<'static, StreamFrame<T>>;

/// Inbound half of a duplex call: results pushed by the backend.
pub type ResponseStream<T> = BoxStream<'static, BackendResult<T>>;

/// A backend reached through one duplex streaming call per stream.
///
/// `open_stream` wires the given request stream into a new remote call and
/// returns the remote response stream. The request stream ends after it
/// yields [`StreamFrame::EndOfStream`] or when the owning adapter is closed.
#[async_trait]
pub trait StreamingBackend: Send + Sync {
    /// Outbound item type (audio chunk, text chunk)
    type Request: Send + 'static;
    /// Inbound item type (transcript, synthesized audio)
    type Response: Send + 'static;

    /// Which backend this is, for logging and error reporting.
    fn kind(&self) -> BackendKind;

    /// Open a new remote streaming call fed by `requests`.
    async fn open_stream(
        &self,
        requests: RequestStream<Self::Request>,
    ) -> BackendResult<ResponseStream<Self::Response>>;

    /// Release the underlying channel. Later calls fail with `ConnectionFailed`.
    fn release(&self) {}
}

/// A backend reached through a unary request/response call.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Submit `query` and return the answer text.
    async fn retrieve(&self, query: &str) -> BackendResult<String>;

    /// Release the underlying channel. Later calls fail with `ConnectionFailed`.
    fn release(&self) {}
}

/// The backend handles owned by one session.
#[derive(Clone)]
pub struct SessionBackends {
    pub speech: Arc<SpeechBackend>,
    pub synthesis: Arc<SynthesisBackend>,
    pub query: Arc<dyn QueryBackend>,
}

/// Creates the per-session backend handles.
///
/// Called once per accepted connection; every session gets its own handles
/// so that releasing them at teardown never affects another session.
pub trait BackendConnector: Send + Sync {
    fn connect(&self, session_id: &str) -> BackendResult<SessionBackends>;
}
