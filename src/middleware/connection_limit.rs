//! Session admission for the assistant WebSocket route.
//!
//! Upgrade requests must win a connection slot before they reach the
//! handler: a full server answers 503, a client IP over its quota 429.
//! The slot travels with the request as a [`SessionSlot`] extension. The
//! handler moves it into the session on upgrade; any request that ends
//! without upgrading drops it and gives the slot back.
//!
//! ```ignore
//! let chat = routes::assistant::create_assistant_router().layer(
//!     axum::middleware::from_fn_with_state(state.clone(), connection_limit_middleware),
//! );
//! ```

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::{AppState, ConnectionGuard, ConnectionLimitError};

/// A reserved connection slot, shared between the request and the session
/// it turns into. Released once the last copy is dropped.
#[derive(Clone)]
pub struct SessionSlot(Arc<ConnectionGuard>);

impl SessionSlot {
    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }
}

fn wants_websocket(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Admit or refuse a WebSocket upgrade request.
///
/// Plain HTTP requests are passed through untouched.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !wants_websocket(&request) {
        return next.run(request).await;
    }

    let ip = addr.ip();
    match ConnectionGuard::acquire(&state, ip) {
        Ok(guard) => {
            request
                .extensions_mut()
                .insert(SessionSlot(Arc::new(guard)));
            next.run(request).await
        }
        Err(ConnectionLimitError::GlobalLimitReached) => {
            tracing::warn!(ip = %ip, "Session refused: server at capacity");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
        Err(ConnectionLimitError::PerIpLimitReached) => {
            tracing::warn!(ip = %ip, "Session refused: per-IP quota used up");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many connections from your IP address.",
            )
                .into_response()
        }
    }
}
