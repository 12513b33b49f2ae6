use crate::store::SharedStore;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shortest period between reaping passes.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Background task that evicts expired items every `interval`.
///
/// Eviction is silent and best-effort. `stop` waits for the task to exit, so
/// once it returns no reaping pass is running or will run again.
#[derive(Debug)]
pub struct Reaper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Start reaping `store`. Intervals below `MIN_INTERVAL` are raised to it.
    pub fn spawn(store: SharedStore, interval: Duration) -> Self {
        let interval = if interval < MIN_INTERVAL {
            warn!("Reap interval {interval:?} too short, using {MIN_INTERVAL:?}");
            MIN_INTERVAL
        } else {
            interval
        };
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            reap_loop(store, interval, token).await;
        });
        Reaper { cancel, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        // A pass in progress finishes before the task observes the token.
        if let Err(e) = self.handle.await {
            warn!("Reaper task failed: {e}");
            return;
        }
        info!("Reaper stopped");
    }
}

async fn reap_loop(store: SharedStore, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let removed = store.purge_expired().await;
                if removed > 0 {
                    debug!("Reaped {removed} expired items");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::store::item::now_seconds;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_reaper_evicts_within_interval() {
        let store: SharedStore = Arc::new(Store::new());
        for i in 0..5 {
            store.put(i.to_string(), i.to_string(), now_seconds()).await.unwrap();
        }
        store.put("live".into(), "v".into(), now_seconds() + 600).await.unwrap();

        let reaper = Reaper::spawn(store.clone(), Duration::from_secs(2));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("live").await.unwrap(), "v");
        reaper.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_final() {
        let store: SharedStore = Arc::new(Store::new());
        let reaper = Reaper::spawn(store.clone(), Duration::from_millis(100));
        assert!(reaper.is_running());
        reaper.stop().await;

        store.put("dead".into(), "v".into(), now_seconds() - 10).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        // Nothing reaps after stop
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let store: SharedStore = Arc::new(Store::new());
        store.put("dead".into(), "v".into(), now_seconds() - 10).await.unwrap();

        let reaper = Reaper::spawn(store.clone(), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(reaper.is_running());
        assert_eq!(store.len().await, 0);
        reaper.stop().await;
    }
}
