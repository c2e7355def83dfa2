//! In-process mock backends
//!
//! Stand-ins for the recognizer, synthesizer and answer service with
//! scriptable behavior:
//! - scripted transcripts and audio chunks
//! - failures on open or mid-stream
//! - streams that never finish
//! - answer latency

// Not every test binary uses every helper
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use assistant_gateway::core::backend::{
    BackendConnector, BackendError, BackendKind, BackendResult, QueryBackend, RequestStream,
    ResponseStream, SessionBackends, StreamingBackend,
};
use assistant_gateway::core::streaming::StreamFrame;
use assistant_gateway::core::stt::TranscriptEvent;
use assistant_gateway::core::tts::SynthesizedAudio;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Turn an unbounded receiver into a boxed response stream.
fn response_stream<T: Send + 'static>(
    rx: mpsc::UnboundedReceiver<BackendResult<T>>,
) -> ResponseStream<T> {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed()
}

/// Mock speech recognizer.
///
/// Records every audio chunk. Optionally answers the first chunk with a
/// partial, and replays its script once the end-of-stream marker arrives.
#[derive(Default)]
pub struct MockSpeech {
    script: Vec<TranscriptEvent>,
    partial: Option<String>,
    fail_open: bool,
    fail_after_chunks: Option<usize>,
    hang_after_end: bool,

    opens: AtomicUsize,
    released: AtomicBool,
    chunks: Arc<Mutex<Vec<Bytes>>>,
    ends: Arc<AtomicUsize>,
}

impl MockSpeech {
    /// Recognizer that replays `script` after end of stream.
    pub fn new(script: Vec<TranscriptEvent>) -> Self {
        Self {
            script,
            ..Default::default()
        }
    }

    /// Recognizer that hears `text` as a single final result.
    pub fn hearing(text: &str) -> Self {
        Self::new(vec![TranscriptEvent::final_text(text)])
    }

    pub fn with_partial(mut self, text: &str) -> Self {
        self.partial = Some(text.to_string());
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_after(mut self, chunks: usize) -> Self {
        self.fail_after_chunks = Some(chunks);
        self
    }

    /// Never sends a result after end of stream, and never finishes.
    pub fn hanging_after_end(mut self) -> Self {
        self.hang_after_end = true;
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn chunks(&self) -> Vec<Bytes> {
        self.chunks.lock().clone()
    }

    /// Number of end-of-stream markers received.
    pub fn ends(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamingBackend for MockSpeech {
    type Request = Bytes;
    type Response = TranscriptEvent;

    fn kind(&self) -> BackendKind {
        BackendKind::Stt
    }

    async fn open_stream(
        &self,
        mut requests: RequestStream<Bytes>,
    ) -> BackendResult<ResponseStream<TranscriptEvent>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(BackendError::ConnectionFailed(
                "mock recognizer unavailable".to_string(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let script = self.script.clone();
        let partial = self.partial.clone();
        let fail_after = self.fail_after_chunks;
        let hang = self.hang_after_end;
        let chunks = self.chunks.clone();
        let ends = self.ends.clone();

        tokio::spawn(async move {
            let mut received = 0;
            let mut saw_end = false;

            while let Some(frame) = requests.next().await {
                match frame {
                    StreamFrame::Item(pcm) => {
                        chunks.lock().push(pcm);
                        received += 1;

                        if fail_after.is_some_and(|limit| received >= limit) {
                            let _ = tx.send(Err(BackendError::ProviderError(
                                "mock recognizer crashed".to_string(),
                            )));
                            return;
                        }
                        if received == 1
                            && let Some(text) = &partial
                        {
                            let _ = tx.send(Ok(TranscriptEvent::partial(text.clone())));
                        }
                    }
                    StreamFrame::EndOfStream => {
                        ends.fetch_add(1, Ordering::SeqCst);
                        saw_end = true;
                        break;
                    }
                }
            }

            if !saw_end {
                return;
            }
            if hang {
                tx.closed().await;
                return;
            }
            for event in script {
                let _ = tx.send(Ok(event));
            }
        });

        Ok(response_stream(rx))
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Mock speech synthesizer.
///
/// Records every text it is asked to speak and answers the end-of-stream
/// marker with its audio chunks followed by the empty final chunk.
pub struct MockSynthesis {
    audio: Vec<Bytes>,
    sample_rate: u32,
    chunk_delay: Duration,
    fail_open: bool,
    hang_before_final: bool,

    opens: AtomicUsize,
    released: AtomicBool,
    texts: Arc<Mutex<Vec<String>>>,
}

impl MockSynthesis {
    pub fn new(audio: Vec<Bytes>) -> Self {
        Self {
            audio,
            sample_rate: 24000,
            chunk_delay: Duration::ZERO,
            fail_open: false,
            hang_before_final: false,
            opens: AtomicUsize::new(0),
            released: AtomicBool::new(false),
            texts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Synthesizer producing `count` chunks of `size` bytes each.
    pub fn with_chunks(count: usize, size: usize) -> Self {
        let audio = (0..count)
            .map(|i| Bytes::from(vec![i as u8; size]))
            .collect();
        Self::new(audio)
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Sends the audio chunks but never the final one.
    pub fn hanging_before_final(mut self) -> Self {
        self.hang_before_final = true;
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().clone()
    }
}

#[async_trait]
impl StreamingBackend for MockSynthesis {
    type Request = String;
    type Response = SynthesizedAudio;

    fn kind(&self) -> BackendKind {
        BackendKind::Tts
    }

    async fn open_stream(
        &self,
        mut requests: RequestStream<String>,
    ) -> BackendResult<ResponseStream<SynthesizedAudio>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(BackendError::ConnectionFailed(
                "mock synthesizer unavailable".to_string(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let audio = self.audio.clone();
        let sample_rate = self.sample_rate;
        let delay = self.chunk_delay;
        let hang = self.hang_before_final;
        let texts = self.texts.clone();

        tokio::spawn(async move {
            let mut saw_end = false;
            while let Some(frame) = requests.next().await {
                match frame {
                    StreamFrame::Item(text) => texts.lock().push(text),
                    StreamFrame::EndOfStream => {
                        saw_end = true;
                        break;
                    }
                }
            }
            if !saw_end {
                return;
            }

            for chunk in audio {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(Ok(SynthesizedAudio::chunk(chunk, sample_rate))).is_err() {
                    return;
                }
            }

            if hang {
                tx.closed().await;
                return;
            }
            let _ = tx.send(Ok(SynthesizedAudio::end()));
        });

        Ok(response_stream(rx))
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Mock answer service.
pub struct MockQuery {
    answer: String,
    delay: Duration,
    failure: Option<BackendError>,

    released: AtomicBool,
    queries: Mutex<Vec<String>>,
}

impl MockQuery {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            delay: Duration::ZERO,
            failure: None,
            released: AtomicBool::new(false),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: BackendError) -> Self {
        Self {
            failure: Some(error),
            ..Self::answering("")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryBackend for MockQuery {
    async fn retrieve(&self, query: &str) -> BackendResult<String> {
        self.queries.lock().push(query.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.answer.clone()),
        }
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// The three mocks of one session, kept around for inspection.
#[derive(Clone)]
pub struct MockBackends {
    pub speech: Arc<MockSpeech>,
    pub synthesis: Arc<MockSynthesis>,
    pub query: Arc<MockQuery>,
}

impl MockBackends {
    pub fn new(speech: MockSpeech, synthesis: MockSynthesis, query: MockQuery) -> Self {
        Self {
            speech: Arc::new(speech),
            synthesis: Arc::new(synthesis),
            query: Arc::new(query),
        }
    }

    pub fn session_backends(&self) -> SessionBackends {
        SessionBackends {
            speech: self.speech.clone(),
            synthesis: self.synthesis.clone(),
            query: self.query.clone(),
        }
    }
}

/// Connector handing every session the same set of mocks.
pub struct MockConnector {
    backends: MockBackends,
    fail: bool,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(backends: MockBackends) -> Self {
        Self {
            backends,
            fail: false,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn failing(backends: MockBackends) -> Self {
        Self {
            fail: true,
            ..Self::new(backends)
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl BackendConnector for MockConnector {
    fn connect(&self, _session_id: &str) -> BackendResult<SessionBackends> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BackendError::ConfigurationError(
                "mock endpoints misconfigured".to_string(),
            ));
        }
        Ok(self.backends.session_backends())
    }
}
