use std::sync::Arc;

use crate::config::RelayConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    /// Every open collaborator connection.
    pub ws_manager: Arc<WsManager>,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config: Arc::new(config),
            ws_manager: Arc::new(WsManager::new()),
        }
    }
}
