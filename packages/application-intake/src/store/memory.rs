use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{EntityStore, Item, RecordKey, StoreError, Transaction};
use crate::domain::{ExternalUid, FollowUpAction};

/// In-memory table.
///
/// Counts reads and write attempts so tests can assert that a redelivered
/// event touched nothing, and can be told to fail writes to exercise the
/// all-or-nothing path.
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<RecordKey, Item>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed items without counting them as writes.
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let store = Self::new();
        for item in items {
            store.seed(item);
        }
        store
    }

    /// Insert `item` outside the counted write path.
    pub fn seed(&self, item: impl Into<Item>) {
        let item = item.into();
        if let Ok(mut map) = self.items.write() {
            map.insert(item.key(), item);
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of everything stored, in key order.
    pub fn snapshot(&self) -> Vec<Item> {
        self.items
            .read()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|map| map.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<RecordKey, Item>>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.items
            .read()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {}", e).into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<RecordKey, Item>>, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected write failure".into()));
        }
        self.items
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {}", e).into()))
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get_by_key(&self, key: &RecordKey) -> Result<Option<Item>, StoreError> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn put(&self, item: Item) -> Result<(), StoreError> {
        self.write()?.insert(item.key(), item);
        Ok(())
    }

    async fn put_if_unchanged(&self, item: Item, expected_hash: &str) -> Result<(), StoreError> {
        let key = item.key();
        let mut items = self.write()?;

        let current = items.get(&key).and_then(Item::integrity_hash);
        if current != Some(expected_hash) {
            return Err(StoreError::Conflict { key });
        }

        items.insert(key, item);
        Ok(())
    }

    async fn write_transaction(&self, transaction: Transaction) -> Result<(), StoreError> {
        transaction.validate()?;
        let mut items = self.write()?;

        if let Some(existing) = transaction
            .creates()
            .iter()
            .map(Item::key)
            .find(|key| items.contains_key(key))
        {
            return Err(StoreError::Duplicate { key: existing });
        }

        let (creates, puts) = transaction.into_parts();
        for item in creates.into_iter().chain(puts) {
            items.insert(item.key(), item);
        }
        Ok(())
    }

    async fn delete_follow_ups(
        &self,
        uid: &ExternalUid,
        actions: &[FollowUpAction],
    ) -> Result<usize, StoreError> {
        let mut items = self.write()?;
        let before = items.len();

        items.retain(|_, item| match item {
            Item::FollowUp(follow_up) => {
                follow_up.uid != *uid
                    || (!actions.is_empty() && !actions.contains(&follow_up.action))
            }
            _ => true,
        });

        Ok(before - items.len())
    }
}
