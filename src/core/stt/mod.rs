//! Speech-to-text backend
//!
//! The recognizer is a duplex stream: PCM16 audio chunks go out, partial and
//! final transcripts come back. A FINAL result can arrive mid-utterance, and
//! one last flush FINAL follows the end-of-stream chunk.

mod grpc;
mod messages;

use bytes::Bytes;

use super::backend::StreamingBackend;

pub use grpc::GrpcSpeechBackend;
pub use messages::{AudioChunk, Transcript, TranscriptEvent, TranscriptType};

/// Any streaming backend that turns audio into transcripts.
pub type SpeechBackend = dyn StreamingBackend<Request = Bytes, Response = TranscriptEvent>;
