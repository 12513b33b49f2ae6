use crate::config::Config;
use crate::error::KvResult;
use crate::persistence::backup_file;
use crate::store::reaper::Reaper;
use crate::store::{SharedStore, Store};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// Owns the store for the life of the process: restores it from the backup
/// file, runs its reaper, and writes the final backup on shutdown.
#[derive(Debug)]
pub struct Engine {
    store: SharedStore,
    reaper: Mutex<Option<Reaper>>,
    backup_path: Option<PathBuf>,
}

impl Engine {
    pub async fn start(backup_path: Option<PathBuf>, reap_interval: Duration) -> KvResult<Self> {
        let store: SharedStore = Arc::new(Store::new());
        if let Some(path) = &backup_path {
            backup_file::load(&store, path).await?;
        }
        let reaper = Reaper::spawn(store.clone(), reap_interval);
        info!("Reaper running every {reap_interval:?}");
        Ok(Engine {
            store,
            reaper: Mutex::new(Some(reaper)),
            backup_path,
        })
    }

    pub async fn from_config(config: &Config) -> KvResult<Self> {
        Self::start(config.backup_path.clone(), config.reap_interval).await
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub async fn is_reaping(&self) -> bool {
        self.reaper.lock().await.as_ref().is_some_and(|r| r.is_running())
    }

    /// Stop the reaper, then write the final backup. The reaper has fully
    /// exited before the backup snapshot is taken. Calling this again only
    /// rewrites the backup.
    pub async fn shutdown(&self) -> KvResult<()> {
        let reaper = self.reaper.lock().await.take();
        if let Some(reaper) = reaper {
            reaper.stop().await;
        }
        if let Some(path) = &self.backup_path {
            backup_file::save(&self.store, path).await?;
        }
        Ok(())
    }
}
