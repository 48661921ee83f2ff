// Application state module
// Shared, read-mostly state handed to every connection

use std::sync::Arc;
use std::time::Duration;

use super::types::Config;
use crate::storage::StorageProvider;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Resolves region-scoped storage clients per request
    pub storage: Arc<dyn StorageProvider>,

    // Values derived once from config
    pub access_log: bool,
    pub presign_expiry: Duration,
    pub storage_timeout: Duration,
}

impl AppState {
    pub fn new(config: &Config, storage: Arc<dyn StorageProvider>) -> Self {
        Self {
            access_log: config.logging.access_log,
            presign_expiry: config.presign_expiry(),
            storage_timeout: config.storage_timeout(),
            config: config.clone(),
            storage,
        }
    }

    pub const fn access_log_enabled(&self) -> bool {
        self.access_log
    }
}
