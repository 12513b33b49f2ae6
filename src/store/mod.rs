pub mod item;
pub mod reaper;

use crate::error::{KvError, KvResult};
use crate::persistence::snapshot;
use item::{Item, now_seconds};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::debug;

/// Concurrent key/value map with absolute-time expiry.
///
/// Mutations take the write lock for the whole change, reads take the read
/// lock. No I/O happens while either lock is held: `backup` copies the items
/// out first and serializes afterwards.
///
/// Reads check expiry lazily, so a dead item is never returned even if the
/// reaper has not visited it yet. The item itself stays in the map (and in
/// backups) until it is reaped or overwritten.
#[derive(Debug, Default)]
pub struct Store {
    data: RwLock<HashMap<String, Item>>,
}

impl Store {
    pub fn new() -> Self {
        Store {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the item for `key`. Last write wins.
    pub async fn put(&self, key: String, value: String, expiration: i64) -> KvResult<()> {
        let item = Item {
            key: key.clone(),
            value,
            expiration,
        };
        self.data.write().await.insert(key, item);
        Ok(())
    }

    pub async fn get(&self, key: &str) -> KvResult<String> {
        let now = now_seconds();
        let data = self.data.read().await;
        match data.get(key) {
            Some(item) if !item.is_expired_at(now) => Ok(item.value.clone()),
            _ => Err(KvError::KeyNotFound),
        }
    }

    /// Remove `key` if present. Absent keys are not an error.
    pub async fn delete(&self, key: &str) {
        self.data.write().await.remove(key);
    }

    /// Number of items held, including expired ones not reaped yet.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// Copy of every item currently held, live or not.
    pub async fn snapshot(&self) -> Vec<Item> {
        self.data.read().await.values().cloned().collect()
    }

    /// Keys whose expiration is at or before `now`.
    pub async fn expired_keys(&self, now: i64) -> Vec<String> {
        self.data
            .read()
            .await
            .iter()
            .filter(|(_, item)| item.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Remove `key` only if it is still expired at `now`. A key renewed by a
    /// Put since it was scanned is left alone; a key already gone is a no-op.
    pub async fn evict_if_expired(&self, key: &str, now: i64) -> bool {
        let mut data = self.data.write().await;
        if data.get(key).is_some_and(|item| item.is_expired_at(now)) {
            data.remove(key);
            true
        } else {
            false
        }
    }

    /// One reaping pass: scan under the read lock, then evict each candidate
    /// under its own short write lock. Returns the number of keys removed.
    pub async fn purge_expired(&self) -> usize {
        let now = now_seconds();
        let candidates = self.expired_keys(now).await;
        let mut removed = 0;
        for key in candidates {
            if self.evict_if_expired(&key, now).await {
                removed += 1;
            }
        }
        removed
    }

    /// Write every item as one JSON line. Order is unspecified.
    ///
    /// On a sink error the lines already written stay written.
    pub async fn backup<W>(&self, sink: &mut W) -> KvResult<usize>
    where
        W: AsyncWrite + Unpin,
    {
        let items = self.snapshot().await;
        for item in &items {
            let line = snapshot::encode_item(item)?;
            sink.write_all(&line).await?;
        }
        sink.flush().await?;
        Ok(items.len())
    }

    /// Read JSON item lines and `put` each one, merging into the current map.
    ///
    /// Stops at the first malformed line and returns its error. Items read
    /// before that line have already been applied.
    pub async fn restore<R>(&self, source: &mut R) -> KvResult<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = Vec::new();
        let mut count = 0;
        loop {
            line.clear();
            if source.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            let Some(item) = snapshot::decode_line(&line)? else {
                continue;
            };
            self.put(item.key, item.value, item.expiration).await?;
            count += 1;
        }
        debug!("Restored {count} items");
        Ok(count)
    }
}

pub type SharedStore = Arc<Store>;
