//! Entity Store Adapter.
//!
//! A thin abstraction over a key-value table: point reads, reads through the
//! external-UID index, single-item puts and atomic multi-item transactions.
//! `MemoryStore` backs tests and local replays.

mod item;
mod keys;
mod memory;
mod transaction;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ApplicationRecord, ExternalUid, FollowUpAction};

pub use item::{Item, MarkerRecord, ReservationRecord, SecondaryIndexRecord};
pub use keys::{
    PartitionKey, RecordKey, SortKey, APPLICATION_PREFIX, DONOR_PREFIX, EVIDENCE_RECEIVED,
    METADATA_PREFIX, RESERVED_PREFIX, SCHEDULED_DAY_PREFIX, SCHEDULED_PREFIX, UID_PREFIX,
};
pub use memory::MemoryStore;
pub use transaction::Transaction;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A create targeted a key that already holds an item.
    #[error("item already exists at {key}")]
    Duplicate { key: RecordKey },

    /// The same key appeared twice in one transaction.
    #[error("key {key} repeated within transaction")]
    RepeatedKey { key: RecordKey },

    /// A conditional put found a different integrity hash.
    #[error("record at {key} changed since it was read")]
    Conflict { key: RecordKey },

    #[error("expected {expected} at {key}, found {found}")]
    UnexpectedItem {
        key: RecordKey,
        expected: &'static str,
        found: &'static str,
    },

    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Point lookup by primary key.
    async fn get_by_key(&self, key: &RecordKey) -> Result<Option<Item>, StoreError>;

    /// Unconditional overwrite. The caller stamps `updated_at` and the hash.
    async fn put(&self, item: Item) -> Result<(), StoreError>;

    /// Overwrite only if the stored record still carries `expected_hash`.
    async fn put_if_unchanged(&self, item: Item, expected_hash: &str) -> Result<(), StoreError>;

    /// Apply every create and put, or none of them.
    async fn write_transaction(&self, transaction: Transaction) -> Result<(), StoreError>;

    /// Remove scheduled follow-ups for `uid` whose action is in `actions`, or
    /// every follow-up for `uid` when `actions` is empty. Returns how many
    /// were removed.
    async fn delete_follow_ups(
        &self,
        uid: &ExternalUid,
        actions: &[FollowUpAction],
    ) -> Result<usize, StoreError>;

    /// Resolve an external UID to the primary key of its record.
    async fn get_by_external_uid(&self, uid: &ExternalUid) -> Result<Option<RecordKey>, StoreError> {
        let key = RecordKey::uid_index(uid);
        match self.get_by_key(&key).await? {
            Some(Item::Index(index)) => Ok(Some(index.target)),
            Some(other) => Err(StoreError::UnexpectedItem {
                key,
                expected: "index",
                found: other.item_type(),
            }),
            None => Ok(None),
        }
    }

    async fn get_application(&self, key: &RecordKey) -> Result<Option<ApplicationRecord>, StoreError> {
        match self.get_by_key(key).await? {
            Some(Item::Application(record)) => Ok(Some(record)),
            Some(other) => Err(StoreError::UnexpectedItem {
                key: key.clone(),
                expected: "application",
                found: other.item_type(),
            }),
            None => Ok(None),
        }
    }
}
