//! Speech recognition wire messages.
//!
//! ```protobuf
//! message AudioChunk {
//!     bytes pcm = 1;
//!     bool end_of_stream = 2;
//! }
//!
//! enum TranscriptType {
//!     PARTIAL = 0;
//!     FINAL = 1;
//! }
//!
//! message Transcript {
//!     string text = 1;
//!     TranscriptType type = 2;
//! }
//! ```

use bytes::Bytes;

use crate::core::streaming::StreamFrame;

/// Audio sent to the recognizer. The last chunk of a stream carries
/// `end_of_stream = true` and no audio.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AudioChunk {
    /// Raw PCM16 mono audio
    #[prost(bytes = "bytes", tag = "1")]
    pub pcm: Bytes,
    #[prost(bool, tag = "2")]
    pub end_of_stream: bool,
}

impl From<StreamFrame<Bytes>> for AudioChunk {
    fn from(frame: StreamFrame<Bytes>) -> Self {
        match frame {
            StreamFrame::Item(pcm) => Self {
                pcm,
                end_of_stream: false,
            },
            StreamFrame::EndOfStream => Self {
                pcm: Bytes::new(),
                end_of_stream: true,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum TranscriptType {
    Partial = 0,
    Final = 1,
}

/// Recognition result produced by the recognizer.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Transcript {
    #[prost(string, tag = "1")]
    pub text: String,
    #[prost(enumeration = "TranscriptType", tag = "2")]
    pub kind: i32,
}

/// A transcript as seen by the turn coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
}

impl TranscriptEvent {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

impl From<Transcript> for TranscriptEvent {
    fn from(transcript: Transcript) -> Self {
        // Unknown enum values are treated as partial results
        let is_final = transcript.kind == TranscriptType::Final as i32;
        Self {
            text: transcript.text,
            is_final,
        }
    }
}
