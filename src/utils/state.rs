use std::sync::Arc;

use crate::config::Config;
use crate::storage::CacheStore;
use crate::storage::driver::filesystem::FilesystemStore;

/// Shared handler state: the storage engine behind its trait object plus
/// the configuration snapshot.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CacheStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = Arc::new(FilesystemStore::new(&config.root_dir, config.retention));
        AppState {
            store,
            config: Arc::new(config),
        }
    }

    /// Builds state around an injected store, used to run the transport
    /// against the in-memory driver.
    pub fn with_store(config: Config, store: Arc<dyn CacheStore>) -> Self {
        AppState {
            store,
            config: Arc::new(config),
        }
    }
}
