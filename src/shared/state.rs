use std::sync::Arc;

use crate::ai::AiProvider;
use crate::config::AppConfig;
use crate::email::Mailer;
use crate::shared::utils::DbPool;

/// Shared application state handed to every handler. The AI gateway is a
/// trait object so tests and deployments can swap the provider without
/// touching the workflow code.
pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub ai: Arc<dyn AiProvider>,
    pub mailer: Arc<Mailer>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("conn", &"DbPool")
            .field("config", &"AppConfig")
            .field("ai", &"Arc<dyn AiProvider>")
            .field("mailer", &"Arc<Mailer>")
            .finish()
    }
}
