//! Speech synthesis wire messages.
//!
//! ```protobuf
//! message TTSRequest {
//!     string text = 1;
//!     bool end_of_stream = 2;
//! }
//!
//! message TTSResponse {
//!     bytes audio = 1;
//!     int32 sample_rate = 2;
//!     bool is_final = 3;
//! }
//! ```

use bytes::Bytes;

use crate::core::streaming::StreamFrame;

#[derive(Clone, PartialEq, prost::Message)]
pub struct TtsRequest {
    #[prost(string, tag = "1")]
    pub text: String,
    #[prost(bool, tag = "2")]
    pub end_of_stream: bool,
}

impl From<StreamFrame<String>> for TtsRequest {
    fn from(frame: StreamFrame<String>) -> Self {
        match frame {
            StreamFrame::Item(text) => Self {
                text,
                end_of_stream: false,
            },
            StreamFrame::EndOfStream => Self {
                text: String::new(),
                end_of_stream: true,
            },
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TtsResponse {
    /// PCM16 mono audio; may be empty on the final response
    #[prost(bytes = "bytes", tag = "1")]
    pub audio: Bytes,
    #[prost(int32, tag = "2")]
    pub sample_rate: i32,
    #[prost(bool, tag = "3")]
    pub is_final: bool,
}

/// A chunk of synthesized audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub audio: Bytes,
    /// Sample rate reported by the synthesizer, if any
    pub sample_rate: Option<u32>,
    /// Last chunk of the synthesis
    pub is_final: bool,
}

impl SynthesizedAudio {
    pub fn chunk(audio: impl Into<Bytes>, sample_rate: u32) -> Self {
        Self {
            audio: audio.into(),
            sample_rate: Some(sample_rate),
            is_final: false,
        }
    }

    /// The empty terminal chunk.
    pub fn end() -> Self {
        Self {
            audio: Bytes::new(),
            sample_rate: None,
            is_final: true,
        }
    }
}

impl From<TtsResponse> for SynthesizedAudio {
    fn from(response: TtsResponse) -> Self {
        let sample_rate = u32::try_from(response.sample_rate)
            .ok()
            .filter(|rate| *rate > 0);
        Self {
            audio: response.audio,
            sample_rate,
            is_final: response.is_final,
        }
    }
}
