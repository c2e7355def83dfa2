use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::config::ServerConfig;
use crate::core::backend::BackendConnector;
use crate::core::grpc::GrpcConnector;

/// Why a new WebSocket connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
    PerIpLimitReached,
}

/// Application state shared by every request handler.
pub struct AppState {
    pub config: ServerConfig,
    /// Creates the backend handles of each new session
    pub connector: Arc<dyn BackendConnector>,

    ws_connections: AtomicUsize,
    ip_connections: Mutex<HashMap<IpAddr, u32>>,
}

impl AppState {
    /// State backed by the gRPC backends named in `config`.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let connector = Arc::new(GrpcConnector::from_config(&config));
        Self::with_connector(config, connector)
    }

    /// State with a custom backend connector.
    pub fn with_connector(config: ServerConfig, connector: Arc<dyn BackendConnector>) -> Arc<Self> {
        Arc::new(Self {
            config,
            connector,
            ws_connections: AtomicUsize::new(0),
            ip_connections: Mutex::new(HashMap::new()),
        })
    }

    /// Reserve a connection slot for `ip`.
    ///
    /// Every successful call must be paired with [`AppState::release_connection`];
    /// [`ConnectionGuard`] does that on drop.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        let mut per_ip = self.ip_connections.lock();

        if let Some(max) = self.config.max_websocket_connections
            && self.ws_connections.load(Ordering::Acquire) >= max
        {
            return Err(ConnectionLimitError::GlobalLimitReached);
        }

        let count = per_ip.entry(ip).or_insert(0);
        if *count >= self.config.max_connections_per_ip {
            if *count == 0 {
                per_ip.remove(&ip);
            }
            return Err(ConnectionLimitError::PerIpLimitReached);
        }

        *count += 1;
        self.ws_connections.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Release a slot taken by [`AppState::try_acquire_connection`].
    pub fn release_connection(&self, ip: IpAddr) {
        let mut per_ip = self.ip_connections.lock();

        let Some(count) = per_ip.get_mut(&ip) else {
            tracing::warn!(ip = %ip, "Releasing connection that was never acquired");
            return;
        };

        *count -= 1;
        if *count == 0 {
            per_ip.remove(&ip);
        }
        self.ws_connections.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.lock().get(ip).copied().unwrap_or(0)
    }
}

/// One reserved connection slot, released when dropped.
pub struct ConnectionGuard {
    state: Arc<AppState>,
    ip: IpAddr,
}

impl ConnectionGuard {
    /// Reserve a slot for `ip`, or report which limit refused it.
    pub fn acquire(state: &Arc<AppState>, ip: IpAddr) -> Result<Self, ConnectionLimitError> {
        state.try_acquire_connection(ip)?;
        Ok(Self {
            state: state.clone(),
            ip,
        })
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.release_connection(self.ip);
    }
}
