use bytes::Bytes;

use crate::core::backend::BackendResult;
use crate::core::streaming::{StreamEvent, StreamId};
use crate::core::stt::TranscriptEvent;
use crate::core::tts::SynthesizedAudio;

/// Sequence number of a turn within a session.
pub type TurnId = u64;

/// A decoded inbound client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Raw PCM16 audio
    Audio(Bytes),
    /// Open a recognition stream without sending audio yet
    StartRecording,
    /// End of the user's utterance
    Finalize,
    /// Direct text query that skips recognition
    TextQuery(String),
}

/// Something that happened on a background task, delivered to the session's
/// foreground task.
#[derive(Debug)]
pub enum BackendEvent {
    Recognition {
        stream: StreamId,
        event: StreamEvent<TranscriptEvent>,
    },
    Synthesis {
        stream: StreamId,
        event: StreamEvent<SynthesizedAudio>,
    },
    /// The answer lookup for `turn` completed
    Answer {
        turn: TurnId,
        result: BackendResult<String>,
    },
    /// Recognition for `turn` did not settle in time after `finalize`
    FinalizeTimeout { turn: TurnId },
}

/// An outbound event for the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Transcript { text: String, is_final: bool },
    Response { text: String },
    /// Describes the audio frame that follows it
    AudioMetadata { sample_rate: u32, length_bytes: usize },
    Audio(Bytes),
    /// Playback of the current answer is complete
    AudioEnd,
    Error { code: &'static str, message: String },
}
