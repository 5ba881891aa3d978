use std::sync::Arc;

use deckscore::{Config, DeckService};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: DeckService,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(service: DeckService, config: Config) -> Self {
        Self {
            service,
            config: Arc::new(config),
        }
    }
}
