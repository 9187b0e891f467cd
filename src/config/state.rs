// Application state module
// Shared, read-only state handed to every request

use std::sync::Arc;

use super::types::Config;
use crate::logger::Logger;
use crate::storage::ObjectStore;

/// Application state
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ObjectStore>,
    pub logger: Arc<Logger>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ObjectStore>, logger: Arc<Logger>) -> Self {
        Self {
            config,
            store,
            logger,
        }
    }
}
