use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::{BackendEvent, ClientCommand, SessionEvent, TurnId};
use super::state::TurnState;
use crate::config::ServerConfig;
use crate::core::backend::SessionBackends;
use crate::core::streaming::{
    DEFAULT_QUEUE_CAPACITY, StreamCallback, StreamEvent, StreamId, StreamingAdapter,
};
use crate::core::stt::TranscriptEvent;
use crate::core::tts::{DEFAULT_SAMPLE_RATE, SynthesizedAudio};
use crate::core::ttt::{DEFAULT_QUERY_TIMEOUT, QueryClient};
use crate::errors::SessionError;

/// Buffer size of the channel carrying background events to the session task
const BACKEND_EVENT_BUFFER_SIZE: usize = 256;

/// Per-session turn behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSettings {
    pub query_timeout: Duration,
    pub finalize_timeout: Duration,
    pub stream_queue_capacity: usize,
    pub send_audio_metadata: bool,
    /// Reported in `audio.metadata` when the synthesizer sends no rate
    pub default_sample_rate: u32,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            finalize_timeout: Duration::from_secs(10),
            stream_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            send_audio_metadata: false,
            default_sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl From<&ServerConfig> for TurnSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            query_timeout: config.query_timeout(),
            finalize_timeout: config.finalize_timeout(),
            stream_queue_capacity: config.stream_queue_capacity,
            send_audio_metadata: config.send_audio_metadata,
            default_sample_rate: config.tts_sample_rate,
        }
    }
}

/// Per-session turn state machine.
///
/// Owned and driven by the session's foreground task, which feeds it client
/// commands and the [`BackendEvent`]s arriving on the receiver returned by
/// [`TurnCoordinator::new`]. Reader tasks and the answer lookup never touch
/// the coordinator directly; they only post events.
///
/// ```text
/// Idle ─audio/start_recording─▶ Listening ─finalize─▶ Finalizing ─final─▶ Querying ─answer─▶ Speaking ─final audio─▶ Idle
/// ```
///
/// Any backend failure aborts the current turn and returns to `Idle`.
pub struct TurnCoordinator {
    session_id: String,
    state: TurnState,
    turn: TurnId,
    settings: TurnSettings,

    stt: StreamingAdapter<Bytes, TranscriptEvent>,
    tts: StreamingAdapter<String, SynthesizedAudio>,
    query: QueryClient,

    /// Streams belonging to the current turn; events from others are stale
    stt_stream: Option<StreamId>,
    tts_stream: Option<StreamId>,
    /// Final transcript segments of the current turn
    utterance: String,

    query_task: Option<JoinHandle<()>>,
    finalize_watchdog: Option<JoinHandle<()>>,

    events_tx: mpsc::Sender<BackendEvent>,
    outbound: mpsc::Sender<SessionEvent>,
}

impl TurnCoordinator {
    /// Create a coordinator and the receiver its background events arrive on.
    pub fn new(
        session_id: impl Into<String>,
        backends: SessionBackends,
        settings: TurnSettings,
        outbound: mpsc::Sender<SessionEvent>,
    ) -> (Self, mpsc::Receiver<BackendEvent>) {
        let (events_tx, events_rx) = mpsc::channel(BACKEND_EVENT_BUFFER_SIZE);

        let on_transcript = forward_to(events_tx.clone(), |stream, event| {
            BackendEvent::Recognition { stream, event }
        });
        let on_audio = forward_to(events_tx.clone(), |stream, event| BackendEvent::Synthesis {
            stream,
            event,
        });

        let coordinator = Self {
            session_id: session_id.into(),
            state: TurnState::Idle,
            turn: 0,
            stt: StreamingAdapter::new(
                backends.speech,
                settings.stream_queue_capacity,
                on_transcript,
            ),
            tts: StreamingAdapter::new(
                backends.synthesis,
                settings.stream_queue_capacity,
                on_audio,
            ),
            query: QueryClient::new(backends.query, settings.query_timeout),
            settings,
            stt_stream: None,
            tts_stream: None,
            utterance: String::new(),
            query_task: None,
            finalize_watchdog: None,
            events_tx,
            outbound,
        };

        (coordinator, events_rx)
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Id of the current (or last) turn; 0 before the first one.
    pub fn current_turn(&self) -> TurnId {
        self.turn
    }

    /// Apply one inbound client command.
    pub async fn handle_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::Audio(pcm) => self.on_audio(pcm).await,
            ClientCommand::StartRecording => self.on_start_recording().await,
            ClientCommand::Finalize => self.on_finalize().await,
            ClientCommand::TextQuery(text) => self.on_text_query(text).await,
        }
    }

    /// Apply one event posted by a background task.
    pub async fn handle_backend_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Recognition { stream, event } => {
                if self.stt_stream != Some(stream) {
                    debug!(session_id = %self.session_id, stream_id = stream, "Ignoring stale recognition event");
                    return;
                }
                self.on_recognition(event).await;
            }
            BackendEvent::Synthesis { stream, event } => {
                if self.tts_stream != Some(stream) {
                    debug!(session_id = %self.session_id, stream_id = stream, "Ignoring stale synthesis event");
                    return;
                }
                self.on_synthesis(event).await;
            }
            BackendEvent::Answer { turn, result } => {
                if turn != self.turn || self.state != TurnState::Querying {
                    debug!(session_id = %self.session_id, turn, "Ignoring stale answer");
                    return;
                }
                self.query_task = None;
                match result {
                    Ok(answer) => self.on_answer(answer).await,
                    Err(e) => self.fail_turn(e.into()).await,
                }
            }
            BackendEvent::FinalizeTimeout { turn } => {
                if turn != self.turn || self.state != TurnState::Finalizing {
                    return;
                }
                self.finalize_watchdog = None;
                self.fail_turn(SessionError::BackendTimeout(format!(
                    "no final transcript within {} ms",
                    self.settings.finalize_timeout.as_millis()
                )))
                .await;
            }
        }
    }

    /// Send an error event without touching turn state.
    pub async fn report(&self, error: SessionError) {
        debug!(session_id = %self.session_id, code = error.code(), error = %error, "Reporting error");
        self.emit(SessionEvent::Error {
            code: error.code(),
            message: error.to_string(),
        })
        .await;
    }

    /// Release every backend resource held by the session.
    ///
    /// Failures are logged and never returned.
    pub async fn shutdown(&mut self) {
        self.cancel_timers();

        self.stt.stop();
        self.tts.stop();

        if let Err(e) = self.stt.close().await {
            let error = SessionError::TeardownError(e.to_string());
            warn!(session_id = %self.session_id, error = %error, "STT adapter close failed");
        }
        if let Err(e) = self.tts.close().await {
            let error = SessionError::TeardownError(e.to_string());
            warn!(session_id = %self.session_id, error = %error, "TTS adapter close failed");
        }
        self.query.close();

        self.stt_stream = None;
        self.tts_stream = None;
        self.state = TurnState::Idle;
        info!(session_id = %self.session_id, turns = self.turn, "Session resources released");
    }

    async fn on_audio(&mut self, pcm: Bytes) {
        if !self.state.accepts_audio() {
            self.reject_busy(self.state, "audio").await;
            return;
        }
        if self.state == TurnState::Idle && !self.begin_listening().await {
            return;
        }
        self.stt.send(pcm);
    }

    async fn on_start_recording(&mut self) {
        match self.state {
            TurnState::Idle => {
                self.begin_listening().await;
            }
            TurnState::Listening => {
                debug!(session_id = %self.session_id, "Already listening");
            }
            state => self.reject_busy(state, "start_recording").await,
        }
    }

    async fn on_finalize(&mut self) {
        match self.state {
            TurnState::Listening => {
                self.stt.stop();
                self.transition(TurnState::Finalizing);
                self.arm_finalize_watchdog();
            }
            TurnState::Idle => {
                // Nothing was recorded: Finalizing settles straight back to Idle.
                debug!(session_id = %self.session_id, "Finalize with no audio, nothing to recognize");
            }
            TurnState::Finalizing => {
                debug!(session_id = %self.session_id, "Already finalizing");
            }
            state => self.reject_busy(state, "finalize").await,
        }
    }

    async fn on_text_query(&mut self, text: String) {
        if self.state != TurnState::Idle {
            self.reject_busy(self.state, "text query").await;
            return;
        }

        let text = text.trim();
        if text.is_empty() {
            self.report(SessionError::MalformedInput(
                "text query must not be empty".to_string(),
            ))
            .await;
            return;
        }

        self.turn += 1;
        info!(session_id = %self.session_id, turn = self.turn, "Text query turn started");
        self.begin_query(text.to_string());
    }

    async fn on_recognition(&mut self, event: StreamEvent<TranscriptEvent>) {
        match event {
            StreamEvent::Item(transcript) => {
                if !matches!(self.state, TurnState::Listening | TurnState::Finalizing) {
                    return;
                }

                let text = transcript.text.trim();
                if transcript.is_final {
                    if !text.is_empty() {
                        if !self.utterance.is_empty() {
                            self.utterance.push(' ');
                        }
                        self.utterance.push_str(text);
                        self.emit(SessionEvent::Transcript {
                            text: text.to_string(),
                            is_final: true,
                        })
                        .await;
                    }

                    if self.state == TurnState::Finalizing {
                        self.complete_recognition().await;
                    }
                } else if !text.is_empty() {
                    self.emit(SessionEvent::Transcript {
                        text: text.to_string(),
                        is_final: false,
                    })
                    .await;
                }
            }
            StreamEvent::Ended => {
                if matches!(self.state, TurnState::Listening | TurnState::Finalizing) {
                    debug!(session_id = %self.session_id, state = %self.state, "Recognition stream ended");
                    self.complete_recognition().await;
                }
            }
            StreamEvent::Failed(e) => self.fail_turn(e.into()).await,
        }
    }

    async fn on_answer(&mut self, answer: String) {
        self.emit(SessionEvent::Response {
            text: answer.clone(),
        })
        .await;

        if answer.trim().is_empty() {
            debug!(session_id = %self.session_id, turn = self.turn, "Empty answer, skipping synthesis");
            self.transition(TurnState::Idle);
            return;
        }

        match self.tts.start() {
            Ok(stream) => {
                self.tts_stream = Some(stream);
                // Single-shot synthesis: the whole answer, then end of stream.
                self.tts.send(answer);
                self.tts.stop();
                self.transition(TurnState::Speaking);
            }
            Err(e) => self.fail_turn(e.into()).await,
        }
    }

    async fn on_synthesis(&mut self, event: StreamEvent<SynthesizedAudio>) {
        if self.state != TurnState::Speaking {
            return;
        }

        match event {
            StreamEvent::Item(chunk) => {
                if !chunk.audio.is_empty() {
                    if self.settings.send_audio_metadata {
                        self.emit(SessionEvent::AudioMetadata {
                            sample_rate: chunk
                                .sample_rate
                                .unwrap_or(self.settings.default_sample_rate),
                            length_bytes: chunk.audio.len(),
                        })
                        .await;
                    }
                    self.emit(SessionEvent::Audio(chunk.audio)).await;
                }
                if chunk.is_final {
                    self.finish_speaking().await;
                }
            }
            StreamEvent::Ended => self.finish_speaking().await,
            StreamEvent::Failed(e) => self.fail_turn(e.into()).await,
        }
    }

    /// Start a new turn's recognition stream. Returns false if it failed.
    async fn begin_listening(&mut self) -> bool {
        self.turn += 1;
        self.utterance.clear();

        match self.stt.start() {
            Ok(stream) => {
                self.stt_stream = Some(stream);
                self.transition(TurnState::Listening);
                info!(session_id = %self.session_id, turn = self.turn, stream_id = stream, "Turn started");
                true
            }
            Err(e) => {
                self.fail_turn(e.into()).await;
                false
            }
        }
    }

    /// Recognition settled: query with what was heard, or go back to idle.
    async fn complete_recognition(&mut self) {
        self.cancel_watchdog();
        self.stt_stream = None;

        let utterance = std::mem::take(&mut self.utterance);
        if utterance.is_empty() {
            debug!(session_id = %self.session_id, turn = self.turn, "Empty utterance, turn abandoned");
            self.transition(TurnState::Idle);
            return;
        }

        self.begin_query(utterance);
    }

    fn begin_query(&mut self, text: String) {
        self.transition(TurnState::Querying);

        let client = self.query.clone();
        let events = self.events_tx.clone();
        let turn = self.turn;
        self.query_task = Some(tokio::spawn(async move {
            let result = client.ask(&text).await;
            let _ = events.send(BackendEvent::Answer { turn, result }).await;
        }));
    }

    async fn finish_speaking(&mut self) {
        self.tts_stream = None;
        self.emit(SessionEvent::AudioEnd).await;
        self.transition(TurnState::Idle);
        info!(session_id = %self.session_id, turn = self.turn, "Turn complete");
    }

    /// Abort the current turn, release its stream and tell the client.
    async fn fail_turn(&mut self, error: SessionError) {
        warn!(
            session_id = %self.session_id,
            turn = self.turn,
            state = %self.state,
            code = error.code(),
            error = %error,
            "Turn failed"
        );

        self.cancel_timers();
        if self.stt_stream.take().is_some() {
            self.stt.cancel();
        }
        if self.tts_stream.take().is_some() {
            self.tts.cancel();
        }
        self.utterance.clear();
        self.transition(TurnState::Idle);

        self.report(error).await;
    }

    async fn reject_busy(&self, state: TurnState, what: &str) {
        debug!(session_id = %self.session_id, state = %state, "Rejecting {what}");
        self.report(SessionError::ProtocolViolation(format!(
            "cannot accept {what} while {state}"
        )))
        .await;
    }

    fn arm_finalize_watchdog(&mut self) {
        self.cancel_watchdog();

        let events = self.events_tx.clone();
        let timeout = self.settings.finalize_timeout;
        let turn = self.turn;
        self.finalize_watchdog = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(BackendEvent::FinalizeTimeout { turn }).await;
        }));
    }

    fn cancel_watchdog(&mut self) {
        if let Some(watchdog) = self.finalize_watchdog.take() {
            watchdog.abort();
        }
    }

    fn cancel_timers(&mut self) {
        self.cancel_watchdog();
        if let Some(task) = self.query_task.take() {
            task.abort();
        }
    }

    fn transition(&mut self, next: TurnState) {
        if self.state != next {
            debug!(session_id = %self.session_id, from = %self.state, to = %next, "Turn state change");
            self.state = next;
        }
    }

    async fn emit(&self, event: SessionEvent) {
        if self.outbound.send(event).await.is_err() {
            debug!(session_id = %self.session_id, "Outbound channel closed, dropping event");
        }
    }
}

/// Adapter callback that posts every stream event to the session task.
fn forward_to<T, F>(events: mpsc::Sender<BackendEvent>, wrap: F) -> StreamCallback<T>
where
    T: Send + 'static,
    F: Fn(StreamId, StreamEvent<T>) -> BackendEvent + Send + Sync + 'static,
{
    Arc::new(
        move |stream: StreamId, event: StreamEvent<T>| -> Pin<Box<dyn Future<Output = ()> + Send>> {
            let events = events.clone();
            let event = wrap(stream, event);
            Box::pin(async move {
                let _ = events.send(event).await;
            })
        },
    )
}

impl Drop for TurnCoordinator {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}

