use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tonic::transport::Channel;

use super::messages::{AudioChunk, Transcript, TranscriptEvent};
use crate::core::backend::{
    BackendKind, BackendResult, RequestStream, ResponseStream, StreamingBackend,
};
use crate::core::grpc::{ChannelSlot, open_streaming};

/// gRPC service path for SpeechToText.StreamAudio
const STREAM_AUDIO_PATH: &str = "/stt.SpeechToText/StreamAudio";

/// Speech recognition over the `SpeechToText` gRPC service.
pub struct GrpcSpeechBackend {
    channel: ChannelSlot,
}

impl GrpcSpeechBackend {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel: ChannelSlot::new(BackendKind::Stt, channel),
        }
    }
}

#[async_trait]
impl StreamingBackend for GrpcSpeechBackend {
    type Request = Bytes;
    type Response = TranscriptEvent;

    fn kind(&self) -> BackendKind {
        BackendKind::Stt
    }

    async fn open_stream(
        &self,
        requests: RequestStream<Bytes>,
    ) -> BackendResult<ResponseStream<TranscriptEvent>> {
        let channel = self.channel.get()?;
        let chunks = requests.map(AudioChunk::from);

        let responses = open_streaming::<AudioChunk, Transcript, _>(
            channel,
            STREAM_AUDIO_PATH,
            chunks,
        )
        .await?;

        Ok(responses
            .map(|result| result.map(TranscriptEvent::from))
            .boxed())
    }

    fn release(&self) {
        self.channel.release();
    }
}
