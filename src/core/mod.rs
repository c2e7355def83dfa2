pub mod backend;
pub mod grpc;
pub mod streaming;
pub mod stt;
pub mod tts;
pub mod ttt;
pub mod turn;

// Re-export commonly used types for convenience
pub use backend::{
    BackendConnector, BackendError, BackendKind, BackendResult, QueryBackend, SessionBackends,
    StreamingBackend,
};
pub use grpc::GrpcConnector;
pub use streaming::{StreamEvent, StreamFrame, StreamId, StreamingAdapter};
pub use stt::{SpeechBackend, TranscriptEvent};
pub use tts::{SynthesisBackend, SynthesizedAudio};
pub use ttt::QueryClient;
pub use turn::{BackendEvent, ClientCommand, SessionEvent, TurnCoordinator, TurnSettings, TurnState};
