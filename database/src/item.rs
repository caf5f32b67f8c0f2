use crate::prelude::{DbKey, DbWriter, StoreError, StoreResult, DB};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// A cached DB item with concurrency support
#[derive(Clone)]
pub struct CachedDbItem<T> {
    db: Arc<DB>,
    key: DbKey,
    cached_item: Arc<RwLock<Option<T>>>,
}

impl<T> CachedDbItem<T> {
    pub fn new(db: Arc<DB>, key_prefix: &[u8]) -> Self {
        Self { db, key: DbKey::prefix_only(key_prefix), cached_item: Arc::new(RwLock::new(None)) }
    }

    pub fn read(&self) -> StoreResult<T>
    where
        T: Clone + DeserializeOwned,
    {
        if let Some(item) = self.cached_item.read().clone() {
            return Ok(item);
        }
        if let Some(slice) = self.db.get_pinned(&self.key)? {
            let item: T = bincode::deserialize(&slice)?;
            *self.cached_item.write() = Some(item.clone());
            Ok(item)
        } else {
            Err(StoreError::KeyNotFound(self.key.clone()))
        }
    }

    pub fn write(&mut self, mut writer: impl DbWriter, item: &T) -> StoreResult<()>
    where
        T: Clone + Serialize,
    {
        *self.cached_item.write() = Some(item.clone());
        let bin_data = bincode::serialize(item)?;
        writer.put(&self.key, bin_data)?;
        Ok(())
    }

    pub fn update<F>(&mut self, mut writer: impl DbWriter, op: F) -> StoreResult<T>
    where
        T: Clone + Serialize + DeserializeOwned,
        F: Fn(T) -> T,
    {
        let mut guard = self.cached_item.write();
        let item = if let Some(item) = guard.take() {
            item
        } else if let Some(slice) = self.db.get_pinned(&self.key)? {
            bincode::deserialize(&slice)?
        } else {
            return Err(StoreError::KeyNotFound(self.key.clone()));
        };

        let item = op(item); // Apply the update op
        *guard = Some(item.clone());
        writer.put(&self.key, bincode::serialize(&item)?)?;
        Ok(item)
    }
}
