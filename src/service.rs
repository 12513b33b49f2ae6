use crate::error::KvResult;
use crate::store::SharedStore;
use std::future::Future;

/// Operations the connection handler needs from the storage side.
pub trait Service: Send + Sync + 'static {
    fn put(
        &self,
        key: String,
        value: String,
        expiration: i64,
    ) -> impl Future<Output = KvResult<()>> + Send;

    fn get(&self, key: String) -> impl Future<Output = KvResult<String>> + Send;

    fn delete(&self, key: String) -> impl Future<Output = KvResult<()>> + Send;
}

/// Pass-through from the protocol to a shared `Store`.
#[derive(Debug, Clone)]
pub struct StoreService {
    store: SharedStore,
}

impl StoreService {
    pub fn new(store: SharedStore) -> Self {
        StoreService { store }
    }
}

impl Service for StoreService {
    async fn put(&self, key: String, value: String, expiration: i64) -> KvResult<()> {
        self.store.put(key, value, expiration).await
    }

    async fn get(&self, key: String) -> KvResult<String> {
        self.store.get(&key).await
    }

    async fn delete(&self, key: String) -> KvResult<()> {
        self.store.delete(&key).await;
        Ok(())
    }
}
