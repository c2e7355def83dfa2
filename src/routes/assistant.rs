//! Assistant WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::assistant::assistant_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the assistant WebSocket router
///
/// # Endpoint
///
/// `GET /chat` - WebSocket upgrade for one assistant session
///
/// # Example
///
/// ```json
/// // Client streams binary PCM, then
/// {"action": "finalize"}
///
/// // Server responds
/// {"type": "transcript", "text": "what time is it", "final": true}
/// {"type": "response", "text": "It is noon."}
/// // ...binary audio frames...
/// {"type": "audio.end"}
/// ```
pub fn create_assistant_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", get(assistant_handler))
        .route("/chat/", get(assistant_handler))
        .layer(TraceLayer::new_for_http())
}
