use async_trait::async_trait;
use futures::StreamExt;
use tonic::transport::Channel;

use super::messages::{SynthesizedAudio, TtsRequest, TtsResponse};
use crate::core::backend::{
    BackendKind, BackendResult, RequestStream, ResponseStream, StreamingBackend,
};
use crate::core::grpc::{ChannelSlot, open_streaming};

/// gRPC service path for TextToSpeech.StreamTTS
const STREAM_TTS_PATH: &str = "/tts.TextToSpeech/StreamTTS";

/// Speech synthesis over the `TextToSpeech` gRPC service.
pub struct GrpcSynthesisBackend {
    channel: ChannelSlot,
}

impl GrpcSynthesisBackend {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel: ChannelSlot::new(BackendKind::Tts, channel),
        }
    }
}

#[async_trait]
impl StreamingBackend for GrpcSynthesisBackend {
    type Request = String;
    type Response = SynthesizedAudio;

    fn kind(&self) -> BackendKind {
        BackendKind::Tts
    }

    async fn open_stream(
        &self,
        requests: RequestStream<String>,
    ) -> BackendResult<ResponseStream<SynthesizedAudio>> {
        let channel = self.channel.get()?;
        let texts = requests.map(TtsRequest::from);

        let responses =
            open_streaming::<TtsRequest, TtsResponse, _>(channel, STREAM_TTS_PATH, texts).await?;

        Ok(responses
            .map(|result| result.map(SynthesizedAudio::from))
            .boxed())
    }

    fn release(&self) {
        self.channel.release();
    }
}
