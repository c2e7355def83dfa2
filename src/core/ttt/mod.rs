//! Text-to-text answer retrieval
//!
//! A unary call: the final utterance goes out, the answer text comes back.

mod client;
mod grpc;
mod messages;

pub use client::{DEFAULT_QUERY_TIMEOUT, QueryClient};
pub use grpc::GrpcQueryBackend;
pub use messages::{QueryRequest, TextResponse};
