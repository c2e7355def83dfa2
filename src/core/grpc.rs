//! Shared gRPC plumbing for the inference backends.
//!
//! All three backends are plain protobuf services reached over a `tonic`
//! channel. Calls go through the low-level `tonic::client::Grpc` wrapper with
//! a `ProstCodec`, so no generated service stubs are needed:
//!
//! ```protobuf
//! service SpeechToText    { rpc StreamAudio(stream AudioChunk) returns (stream Transcript); }
//! service TextToSpeech    { rpc StreamTTS(stream TTSRequest)   returns (stream TTSResponse); }
//! service RetrieveContext { rpc RetrieveText(QueryRequest)     returns (TextResponse); }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};
use tracing::{debug, info};

use super::backend::{
    BackendConnector, BackendError, BackendKind, BackendResult, ResponseStream, SessionBackends,
};
use super::stt::GrpcSpeechBackend;
use super::tts::GrpcSynthesisBackend;
use super::ttt::GrpcQueryBackend;
use crate::config::ServerConfig;

/// Build a lazily connecting channel to `url`.
///
/// No network I/O happens here; the first call on the channel connects.
/// Requires a running tokio runtime.
pub fn create_channel(url: &str, connect_timeout: Duration) -> BackendResult<Channel> {
    let mut endpoint = Endpoint::from_shared(url.to_string())
        .map_err(|e| BackendError::ConfigurationError(format!("Invalid endpoint {url}: {e}")))?
        .connect_timeout(connect_timeout)
        .tcp_nodelay(true);

    if url.starts_with("https://") {
        endpoint = endpoint
            .tls_config(ClientTlsConfig::new())
            .map_err(|e| BackendError::ConfigurationError(format!("TLS config error: {e}")))?;
    }

    Ok(endpoint.connect_lazy())
}

/// A channel owned by one backend handle, released at session teardown.
pub(crate) struct ChannelSlot {
    kind: BackendKind,
    channel: Mutex<Option<Channel>>,
}

impl ChannelSlot {
    pub(crate) fn new(kind: BackendKind, channel: Channel) -> Self {
        Self {
            kind,
            channel: Mutex::new(Some(channel)),
        }
    }

    /// A clone of the channel, or `ConnectionFailed` once released.
    pub(crate) fn get(&self) -> BackendResult<Channel> {
        self.channel
            .lock()
            .clone()
            .ok_or_else(|| BackendError::ConnectionFailed(format!("{} channel released", self.kind)))
    }

    pub(crate) fn release(&self) {
        if self.channel.lock().take().is_some() {
            debug!(backend = %self.kind, "gRPC channel released");
        }
    }
}

/// Open a bidirectional streaming call.
pub async fn open_streaming<M1, M2, S>(
    channel: Channel,
    path: &'static str,
    requests: S,
) -> BackendResult<ResponseStream<M2>>
where
    M1: prost::Message + Send + Sync + 'static,
    M2: prost::Message + Default + Send + Sync + 'static,
    S: Stream<Item = M1> + Send + 'static,
{
    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready()
        .await
        .map_err(|e| BackendError::ConnectionFailed(format!("Service not ready: {e}")))?;

    let codec: ProstCodec<M1, M2> = ProstCodec::default();
    let response = grpc
        .streaming(Request::new(requests), PathAndQuery::from_static(path), codec)
        .await
        .map_err(status_to_backend_error)?;

    Ok(response
        .into_inner()
        .map(|item| item.map_err(status_to_backend_error))
        .boxed())
}

/// Issue a unary call bounded by `timeout`.
pub async fn call_unary<M1, M2>(
    channel: Channel,
    path: &'static str,
    message: M1,
    timeout: Duration,
) -> BackendResult<M2>
where
    M1: prost::Message + Send + Sync + 'static,
    M2: prost::Message + Default + Send + Sync + 'static,
{
    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready()
        .await
        .map_err(|e| BackendError::ConnectionFailed(format!("Service not ready: {e}")))?;

    let mut request = Request::new(message);
    request.set_timeout(timeout);

    let codec: ProstCodec<M1, M2> = ProstCodec::default();
    let response = grpc
        .unary(request, PathAndQuery::from_static(path), codec)
        .await
        .map_err(status_to_backend_error)?;

    Ok(response.into_inner())
}

/// Convert a gRPC status to a backend error.
pub fn status_to_backend_error(status: Status) -> BackendError {
    let code = status.code();
    let message = status.message().to_string();

    match code {
        tonic::Code::DeadlineExceeded => {
            BackendError::Timeout(format!("Deadline exceeded: {message}"))
        }
        tonic::Code::Unavailable | tonic::Code::Cancelled => {
            BackendError::ConnectionFailed(format!("{code:?}: {message}"))
        }
        tonic::Code::InvalidArgument => {
            BackendError::ConfigurationError(format!("Invalid argument: {message}"))
        }
        _ => BackendError::ProviderError(format!("gRPC error {code:?}: {message}")),
    }
}

/// Backend connector that opens one lazy channel per backend per session.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    stt_url: String,
    tts_url: String,
    ttt_url: String,
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl GrpcConnector {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            stt_url: config.stt_url.clone(),
            tts_url: config.tts_url.clone(),
            ttt_url: config.ttt_url.clone(),
            connect_timeout: Duration::from_secs(config.backend_connect_timeout_seconds),
            query_timeout: Duration::from_millis(config.query_timeout_ms),
        }
    }
}

impl BackendConnector for GrpcConnector {
    fn connect(&self, session_id: &str) -> BackendResult<SessionBackends> {
        let speech = GrpcSpeechBackend::new(create_channel(&self.stt_url, self.connect_timeout)?);
        let synthesis =
            GrpcSynthesisBackend::new(create_channel(&self.tts_url, self.connect_timeout)?);
        let query = GrpcQueryBackend::new(
            create_channel(&self.ttt_url, self.connect_timeout)?,
            self.query_timeout,
        );

        info!(
            session_id = %session_id,
            stt = %self.stt_url,
            tts = %self.tts_url,
            ttt = %self.ttt_url,
            "Backend channels created"
        );

        Ok(SessionBackends {
            speech: Arc::new(speech),
            synthesis: Arc::new(synthesis),
            query: Arc::new(query),
        })
    }
}
