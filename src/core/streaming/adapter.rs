use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::queue::{FrameQueue, PushOutcome};
use super::{StreamCallback, StreamEvent, StreamId};
use crate::core::backend::{BackendError, BackendKind, BackendResult, StreamingBackend};

/// How long `close()` waits for reader tasks to acknowledge cancellation
const READER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// One stream opened by the adapter.
struct StreamHandle<Req> {
    id: StreamId,
    queue: Arc<FrameQueue<Req>>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    stopped: bool,
}

impl<Req> StreamHandle<Req> {
    /// Accepting new items: not stopped and the reader is still running.
    fn is_active(&self) -> bool {
        !self.stopped && !self.reader.is_finished()
    }

    fn cancel(&self) {
        self.cancel.cancel();
        self.queue.close();
    }
}

/// Push/pull bridge over a duplex streaming backend.
///
/// At most one stream is active at a time. A stream that has been stopped
/// keeps draining in the background until the backend finishes it; a new
/// stream may be started meanwhile. Each stream gets its own queue and reader
/// task, and every event the reader reports carries the stream's id.
///
/// All methods except `close` are synchronous and never wait on the network:
/// the remote call is opened by the reader task.
pub struct StreamingAdapter<Req, Resp> {
    backend: Arc<dyn StreamingBackend<Request = Req, Response = Resp>>,
    kind: BackendKind,
    callback: StreamCallback<Resp>,
    queue_capacity: usize,
    next_stream_id: StreamId,
    current: Option<StreamHandle<Req>>,
    draining: Vec<StreamHandle<Req>>,
    closed: bool,
}

impl<Req, Resp> StreamingAdapter<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    pub fn new(
        backend: Arc<dyn StreamingBackend<Request = Req, Response = Resp>>,
        queue_capacity: usize,
        callback: StreamCallback<Resp>,
    ) -> Self {
        let kind = backend.kind();
        Self {
            backend,
            kind,
            callback,
            queue_capacity,
            next_stream_id: 1,
            current: None,
            draining: Vec::new(),
            closed: false,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Whether a stream is currently accepting items.
    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(|handle| handle.is_active())
    }

    /// Id of the active stream, if any.
    pub fn active_stream(&self) -> Option<StreamId> {
        self.current
            .as_ref()
            .filter(|handle| handle.is_active())
            .map(|handle| handle.id)
    }

    /// Start a stream, or return the id of the one already active.
    pub fn start(&mut self) -> BackendResult<StreamId> {
        if self.closed {
            return Err(BackendError::ConnectionFailed(format!(
                "{} adapter is closed",
                self.kind
            )));
        }

        if let Some(id) = self.active_stream() {
            debug!(backend = %self.kind, stream_id = id, "Stream already active");
            return Ok(id);
        }

        if let Some(previous) = self.current.take() {
            self.draining.push(previous);
        }
        self.draining.retain(|handle| !handle.reader.is_finished());

        let id = self.next_stream_id;
        self.next_stream_id += 1;

        let queue = Arc::new(FrameQueue::new(self.queue_capacity));
        let cancel = CancellationToken::new();
        let reader = tokio::spawn(read_responses(
            id,
            self.kind,
            self.backend.clone(),
            queue.clone(),
            cancel.clone(),
            self.callback.clone(),
        ));

        self.current = Some(StreamHandle {
            id,
            queue,
            cancel,
            reader,
            stopped: false,
        });

        info!(backend = %self.kind, stream_id = id, "Stream started");
        Ok(id)
    }

    /// Enqueue an item on the active stream.
    ///
    /// Never blocks. Returns false, and drops the item, when no stream is active.
    pub fn send(&self, item: Req) -> bool {
        let Some(handle) = self.current.as_ref().filter(|handle| handle.is_active()) else {
            debug!(backend = %self.kind, "Stream not active, dropping item");
            return false;
        };

        match handle.queue.push(item) {
            PushOutcome::Queued => true,
            PushOutcome::DroppedOldest => {
                warn!(
                    backend = %self.kind,
                    stream_id = handle.id,
                    dropped = handle.queue.dropped(),
                    "Stream queue full, dropped oldest item"
                );
                true
            }
            PushOutcome::Rejected => {
                debug!(backend = %self.kind, stream_id = handle.id, "Stream queue closed, dropping item");
                false
            }
        }
    }

    /// Signal end-of-stream on the active stream and stop accepting items.
    ///
    /// The reader keeps running until the backend finishes the stream.
    pub fn stop(&mut self) {
        let Some(handle) = self.current.as_mut() else {
            return;
        };
        if handle.stopped {
            return;
        }

        handle.stopped = true;
        if handle.queue.push_end() {
            debug!(backend = %self.kind, stream_id = handle.id, "End of stream queued");
        }
    }

    /// Hard-cancel the active stream without releasing the backend.
    ///
    /// The reader exits without reporting anything further.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            debug!(backend = %self.kind, stream_id = handle.id, "Cancelling stream");
            handle.cancel();
        }
    }

    /// Cancel every stream and release the backend channel.
    ///
    /// Cancellation observed by the readers is not reported. Returns an error
    /// if a reader panicked or did not exit in time.
    pub async fn close(&mut self) -> BackendResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut handles: Vec<StreamHandle<Req>> = self.draining.drain(..).collect();
        handles.extend(self.current.take());

        for handle in &handles {
            handle.cancel();
        }
        self.backend.release();

        let mut result = Ok(());
        for handle in handles {
            match tokio::time::timeout(READER_SHUTDOWN_TIMEOUT, handle.reader).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => {
                    result = Err(BackendError::ProviderError(format!(
                        "{} reader for stream {} failed: {e}",
                        self.kind, handle.id
                    )));
                }
                Err(_) => {
                    result = Err(BackendError::Timeout(format!(
                        "{} reader for stream {} did not stop",
                        self.kind, handle.id
                    )));
                }
            }
        }

        info!(backend = %self.kind, "Adapter closed");
        result
    }
}

impl<Req, Resp> Drop for StreamingAdapter<Req, Resp> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        for handle in self.draining.iter().chain(self.current.iter()) {
            handle.cancel();
        }
    }
}

/// Background reader: opens the remote call and reports its responses.
async fn read_responses<Req, Resp>(
    id: StreamId,
    kind: BackendKind,
    backend: Arc<dyn StreamingBackend<Request = Req, Response = Resp>>,
    queue: Arc<FrameQueue<Req>>,
    cancel: CancellationToken,
    callback: StreamCallback<Resp>,
) where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let requests = queue.clone().into_request_stream();

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        opened = backend.open_stream(requests) => opened,
    };

    let mut responses = match opened {
        Ok(responses) => responses,
        Err(e) => {
            if cancel.is_cancelled() {
                return;
            }
            error!(backend = %kind, stream_id = id, error = %e, "Failed to open stream");
            queue.close();
            callback(id, StreamEvent::Failed(e)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(backend = %kind, stream_id = id, "Reader cancelled");
                return;
            }
            next = responses.next() => match next {
                Some(Ok(item)) => callback(id, StreamEvent::Item(item)).await,
                Some(Err(e)) => {
                    if cancel.is_cancelled() {
                        return;
                    }
                    error!(backend = %kind, stream_id = id, error = %e, "Stream failed");
                    queue.close();
                    callback(id, StreamEvent::Failed(e)).await;
                    return;
                }
                None => {
                    debug!(backend = %kind, stream_id = id, "Stream ended");
                    queue.close();
                    callback(id, StreamEvent::Ended).await;
                    return;
                }
            }
        }
    }
}
