//! Generic duplex stream adapter
//!
//! Turns a push-style `send(item)` API into the pull-style request stream
//! consumed by a remote streaming call, and turns the remote response stream
//! into callback invocations from a background reader task.
//!
//! ```text
//! send(item) → FrameQueue → request stream → backend → response stream → reader task → callback
//! ```
//!
//! Speech recognition and speech synthesis both use [`StreamingAdapter`],
//! parameterized over their outbound and inbound item types.

mod adapter;
mod queue;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::backend::BackendError;

pub use adapter::StreamingAdapter;
pub use queue::{FrameQueue, PushOutcome};

/// Default number of items an adapter queue holds before dropping the oldest.
pub const DEFAULT_QUEUE_CAPACITY: usize = 512;

/// Identifies one stream opened by an adapter. Unique per adapter.
pub type StreamId = u64;

/// An item on the outbound side of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame<T> {
    /// A payload item
    Item(T),
    /// The distinguished end-of-stream marker; always the last frame
    EndOfStream,
}

impl<T> StreamFrame<T> {
    pub fn is_end(&self) -> bool {
        matches!(self, StreamFrame::EndOfStream)
    }
}

/// What the reader task reports for a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<T> {
    /// The backend produced an item
    Item(T),
    /// The remote stream finished normally
    Ended,
    /// The remote stream failed; the reader has exited
    Failed(BackendError),
}

/// Callback invoked by the reader task for every event of a stream.
pub type StreamCallback<T> = Arc<
    dyn Fn(StreamId, StreamEvent<T>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync,
>;
