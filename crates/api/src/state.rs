use std::sync::Arc;

use ferry_client::RestClient;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable; there is deliberately no per-request or
/// cross-request mutable state here. Every import request builds its own
/// session id map and discards it with the response.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Outbound REST client shared for connection pooling.
    pub client: RestClient,
}
