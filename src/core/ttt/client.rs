use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::backend::{BackendError, BackendResult, QueryBackend};

/// Default deadline for one answer lookup.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Stateless request/response client for the answer service.
///
/// Every call is bounded by the client's timeout, so a stalled backend fails
/// with [`BackendError::Timeout`] instead of hanging the caller.
#[derive(Clone)]
pub struct QueryClient {
    backend: Arc<dyn QueryBackend>,
    timeout: Duration,
}

impl QueryClient {
    pub fn new(backend: Arc<dyn QueryBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Ask the backend for the answer to `text`.
    pub async fn ask(&self, text: &str) -> BackendResult<String> {
        debug!(query_len = text.len(), "Sending query");

        match tokio::time::timeout(self.timeout, self.backend.retrieve(text)).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(e)) => {
                warn!(error = %e, "Query failed");
                Err(e)
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Query timed out");
                Err(BackendError::Timeout(format!(
                    "no answer within {} ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }

    /// Release the backend channel. Later calls fail.
    pub fn close(&self) {
        self.backend.release();
    }
}
