use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::stream::BroadcastHub;

/// Application-wide state shared across handlers
///
/// Each `AppState` owns its own hub; nothing here is process-global, so tests
/// can build as many independent instances as they need.
pub struct AppState {
    /// Effective configuration (after file and CLI overrides)
    pub config: AppConfig,
    /// Frame broadcaster feeding every `/stream` connection
    pub hub: Arc<BroadcastHub>,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: AppConfig,
        hub: Arc<BroadcastHub>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            hub,
            shutdown_tx,
        })
    }

    /// Subscribe to shutdown signal
    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Stop producers and end every streaming session
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        self.hub.close_all();
    }
}
