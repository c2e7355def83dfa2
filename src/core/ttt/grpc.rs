use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::Channel;
use tracing::debug;

use super::messages::{QueryRequest, TextResponse};
use crate::core::backend::{BackendKind, BackendResult, QueryBackend};
use crate::core::grpc::{ChannelSlot, call_unary};

/// gRPC service path for RetrieveContext.RetrieveText
const RETRIEVE_TEXT_PATH: &str = "/ttt.RetrieveContext/RetrieveText";

/// Answer retrieval over the `RetrieveContext` gRPC service.
pub struct GrpcQueryBackend {
    channel: ChannelSlot,
    /// gRPC deadline propagated to the server
    deadline: Duration,
}

impl GrpcQueryBackend {
    pub fn new(channel: Channel, deadline: Duration) -> Self {
        Self {
            channel: ChannelSlot::new(BackendKind::Ttt, channel),
            deadline,
        }
    }
}

#[async_trait]
impl QueryBackend for GrpcQueryBackend {
    async fn retrieve(&self, query: &str) -> BackendResult<String> {
        let channel = self.channel.get()?;
        let request = QueryRequest {
            text: query.to_string(),
        };

        let response: TextResponse =
            call_unary(channel, RETRIEVE_TEXT_PATH, request, self.deadline).await?;

        debug!(answer_len = response.text.len(), "Answer received");
        Ok(response.text)
    }

    fn release(&self) {
        self.channel.release();
    }
}
