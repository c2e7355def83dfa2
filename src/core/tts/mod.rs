//! Text-to-speech backend
//!
//! Text goes out, PCM16 audio chunks come back. Every synthesis ends with a
//! response flagged `is_final`, whose audio may be empty.

mod grpc;
mod messages;

use super::backend::StreamingBackend;

pub use grpc::GrpcSynthesisBackend;
pub use messages::{SynthesizedAudio, TtsRequest, TtsResponse};

/// Default playback sample rate when the synthesizer does not report one.
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// Any streaming backend that turns text into audio.
pub type SynthesisBackend = dyn StreamingBackend<Request = String, Response = SynthesizedAudio>;
