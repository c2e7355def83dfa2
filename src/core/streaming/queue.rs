//! Bounded outbound frame queue with drop-oldest overflow.
//!
//! The producer (the session's foreground task) never blocks: when the queue
//! is full the oldest pending item is discarded to make room. The
//! end-of-stream marker is never discarded and nothing can be queued after it.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::StreamFrame;
use crate::core::backend::RequestStream;

/// Result of pushing an item onto a [`FrameQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The item was queued
    Queued,
    /// The item was queued after discarding the oldest pending item
    DroppedOldest,
    /// The queue is finished or closed; the item was discarded
    Rejected,
}

struct QueueState<T> {
    frames: VecDeque<StreamFrame<T>>,
    /// End-of-stream marker has been queued
    finished: bool,
    /// Hard-closed; consumers see the end immediately
    closed: bool,
    dropped: u64,
}

/// Single-producer, single-consumer queue feeding one remote stream.
pub struct FrameQueue<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
    capacity: usize,
}

impl<T> FrameQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                frames: VecDeque::new(),
                finished: false,
                closed: false,
                dropped: 0,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Queue a payload item.
    pub fn push(&self, item: T) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.closed || state.finished {
                return PushOutcome::Rejected;
            }

            // No end marker is queued yet, so every pending frame is an item.
            let outcome = if state.frames.len() >= self.capacity {
                state.frames.pop_front();
                state.dropped += 1;
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Queued
            };
            state.frames.push_back(StreamFrame::Item(item));
            outcome
        };

        self.notify.notify_one();
        outcome
    }

    /// Queue the end-of-stream marker. Returns false if already finished or closed.
    pub fn push_end(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed || state.finished {
                return false;
            }
            state.finished = true;
            state.frames.push_back(StreamFrame::EndOfStream);
        }

        self.notify.notify_one();
        true
    }

    /// Hard-close the queue, discarding pending frames.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
            state.frames.clear();
        }
        self.notify.notify_one();
    }

    /// Wait for the next frame. `None` once the queue is closed.
    pub async fn pop(&self) -> Option<StreamFrame<T>> {
        loop {
            {
                let mut state = self.state.lock();
                if state.closed {
                    return None;
                }
                if let Some(frame) = state.frames.pop_front() {
                    return Some(frame);
                }
            }
            self.notify.notified().await;
        }
    }

    /// Number of frames waiting to be pulled.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Number of items discarded by the drop-oldest policy.
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}

impl<T: Send + 'static> FrameQueue<T> {
    /// Expose the queue as the request stream of a remote call.
    ///
    /// The stream ends right after yielding the end-of-stream marker, or when
    /// the queue is closed.
    pub fn into_request_stream(self: Arc<Self>) -> RequestStream<T> {
        Box::pin(futures::stream::unfold(Some(self), |queue| async move {
            let queue = queue?;
            let frame = queue.pop().await?;
            let next = if frame.is_end() { None } else { Some(queue) };
            Some((frame, next))
        }))
    }
}
