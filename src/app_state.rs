use crate::{config::AppConfig, controller::Controller, session::SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub controller: Controller,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: AppConfig, controller: Controller) -> Self {
        let sessions = SessionStore::new(config.session_idle_ttl, config.max_sessions);
        Self {
            config,
            controller,
            sessions,
        }
    }
}
