//! Assistant WebSocket message types
//!
//! Text frames carry JSON; synthesized audio travels as raw binary frames.

use serde::{Deserialize, Serialize};

use crate::core::turn::{ClientCommand, SessionEvent};
use crate::errors::{SessionError, SessionResult};

/// Maximum allowed size for inbound text frames (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

/// Audio format advertised in `audio.metadata` frames
pub const AUDIO_FORMAT: &str = "pcm";

/// Sample encoding advertised in `audio.metadata` frames
pub const AUDIO_ENCODING: &str = "pcm16";

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Control envelope sent by the client.
///
/// Either `{"action": "start_recording" | "finalize"}` or
/// `{"type": "text", "text": "..."}`.
#[derive(Debug, Default, Deserialize)]
struct IncomingEnvelope {
    #[serde(default)]
    action: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Decode a text frame into a client command.
pub fn parse_command(raw: &str) -> SessionResult<ClientCommand> {
    if raw.len() > MAX_TEXT_SIZE {
        return Err(SessionError::MalformedInput(format!(
            "message too large: {} bytes (max {MAX_TEXT_SIZE})",
            raw.len()
        )));
    }

    let envelope: IncomingEnvelope = serde_json::from_str(raw)
        .map_err(|e| SessionError::MalformedInput(format!("Invalid message format: {e}")))?;

    if let Some(action) = envelope.action.as_deref() {
        return match action {
            "start_recording" => Ok(ClientCommand::StartRecording),
            "finalize" => Ok(ClientCommand::Finalize),
            other => Err(SessionError::MalformedInput(format!(
                "unknown action '{other}'"
            ))),
        };
    }

    match envelope.kind.as_deref() {
        Some("text") => match envelope.text {
            Some(text) => Ok(ClientCommand::TextQuery(text)),
            None => Err(SessionError::MalformedInput(
                "text message requires a 'text' field".to_string(),
            )),
        },
        Some(other) => Err(SessionError::MalformedInput(format!(
            "unknown message type '{other}'"
        ))),
        None => Err(SessionError::MalformedInput(
            "message requires an 'action' or 'type' field".to_string(),
        )),
    }
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// JSON events sent to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    /// Partial or final recognition result
    #[serde(rename = "transcript")]
    Transcript {
        text: String,
        #[serde(rename = "final")]
        is_final: bool,
    },

    /// Answer text for the current turn
    #[serde(rename = "response")]
    Response { text: String },

    /// Describes the binary audio frame that follows
    #[serde(rename = "audio.metadata")]
    AudioMetadata {
        format: &'static str,
        samplerate: u32,
        encoding: &'static str,
        length_bytes: usize,
    },

    /// Playback of the answer is complete
    #[serde(rename = "audio.end")]
    AudioEnd,

    #[serde(rename = "error")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        message: String,
    },
}

/// How one session event goes out on the socket
#[derive(Debug)]
pub enum MessageRoute {
    Outgoing(OutgoingMessage),
    Audio(bytes::Bytes),
}

impl From<SessionEvent> for MessageRoute {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::Transcript { text, is_final } => {
                MessageRoute::Outgoing(OutgoingMessage::Transcript { text, is_final })
            }
            SessionEvent::Response { text } => {
                MessageRoute::Outgoing(OutgoingMessage::Response { text })
            }
            SessionEvent::AudioMetadata {
                sample_rate,
                length_bytes,
            } => MessageRoute::Outgoing(OutgoingMessage::AudioMetadata {
                format: AUDIO_FORMAT,
                samplerate: sample_rate,
                encoding: AUDIO_ENCODING,
                length_bytes,
            }),
            SessionEvent::Audio(data) => MessageRoute::Audio(data),
            SessionEvent::AudioEnd => MessageRoute::Outgoing(OutgoingMessage::AudioEnd),
            SessionEvent::Error { code, message } => {
                MessageRoute::Outgoing(OutgoingMessage::Error {
                    code: Some(code.to_string()),
                    message,
                })
            }
        }
    }
}
