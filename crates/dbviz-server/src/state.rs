//! Shared application state for axum handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::manager::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        AppState {
            sessions: Arc::new(SessionManager::new(config.tick)),
        }
    }
}
