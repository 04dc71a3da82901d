use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use drop_dispatch::{
    DispatchConfig, DropDispatcher, HttpDropFeed, PushClient, WatchExecutor, WatchExecutorConfig,
    WatchStats,
};
use kv_store::{FileStore, KvStore, MemoryStore};

use crate::config::ServerConfig;

const API_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Manager for the watch execution system
/// Integrates with the web server to provide background polling
pub struct WatchManager {
    dispatch: Arc<Mutex<DropDispatcher>>,
    executor: Arc<WatchExecutor>,
    push: Arc<PushClient>,
    executor_handle: Option<JoinHandle<()>>,
}

impl WatchManager {
    /// Build the watch system from configuration.
    pub async fn new(config: &ServerConfig) -> Result<Self> {
        let store: Arc<dyn KvStore> = match &config.data_dir {
            Some(dir) => {
                info!("Persisting notifications under {}", dir.display());
                Arc::new(FileStore::new(dir).context("Failed to open the data directory")?)
            }
            None => {
                info!("No data directory configured, notifications kept in memory");
                Arc::new(MemoryStore::new())
            }
        };

        let dispatch = Arc::new(Mutex::new(
            DropDispatcher::new(&DispatchConfig::default(), store).await,
        ));

        let feed = Arc::new(
            HttpDropFeed::new(&config.api_base_url, config.api_key.clone(), API_TIMEOUT)
                .context("Failed to create the drop feed client")?,
        );

        let push = Arc::new(
            PushClient::new(&config.api_base_url, config.api_key.clone(), API_TIMEOUT)
                .context("Failed to create the push client")?,
        );

        let executor = Arc::new(WatchExecutor::new(
            feed,
            config.filters.clone(),
            dispatch.clone(),
            Some(WatchExecutorConfig::default()),
        ));

        Ok(Self {
            dispatch,
            executor,
            push,
            executor_handle: None,
        })
    }

    /// Start the poll loop in a background task.
    pub fn start(&mut self) {
        if self.executor_handle.is_some() {
            return;
        }

        info!("Starting watch execution system");

        let executor = self.executor.clone();
        self.executor_handle = Some(tokio::spawn(async move {
            executor.run().await;
        }));
    }

    /// Stop the poll loop, cancelling any in-flight cycle.
    pub async fn stop(&mut self) {
        info!("Stopping watch execution system");

        if let Some(handle) = self.executor_handle.take() {
            handle.abort();
            let _ = handle.await;
        }

        info!("Watch execution system stopped");
    }

    /// Request an immediate poll cycle. Returns false when not running.
    pub fn request_refresh(&self) -> bool {
        if self.executor_handle.is_some() {
            self.executor.wake();
            true
        } else {
            false
        }
    }

    /// Whether the poll loop is running.
    pub fn is_running(&self) -> bool {
        self.executor_handle.is_some()
    }

    /// Current poller stats.
    pub async fn stats(&self) -> WatchStats {
        self.executor.stats().await
    }

    /// Shared dispatcher state.
    pub fn dispatch(&self) -> &Arc<Mutex<DropDispatcher>> {
        &self.dispatch
    }

    /// Push registration client.
    pub fn push(&self) -> &PushClient {
        &self.push
    }
}

impl Drop for WatchManager {
    fn drop(&mut self) {
        if let Some(handle) = self.executor_handle.take() {
            handle.abort();
        }
    }
}
