use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PartitionKey, RecordKey, SortKey};
use crate::domain::{ApplicationRecord, ExternalUid, ScheduledFollowUp};

/// Maps an external UID to the primary key of its application record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryIndexRecord {
    pub pk: PartitionKey,
    pub sk: SortKey,
    pub uid: ExternalUid,
    pub target: RecordKey,
    pub created_at: DateTime<Utc>,
}

impl SecondaryIndexRecord {
    pub fn new(uid: ExternalUid, target: RecordKey, now: DateTime<Utc>) -> Self {
        let key = RecordKey::uid_index(&uid);
        Self {
            pk: key.pk,
            sk: key.sk,
            uid,
            target,
            created_at: now,
        }
    }
}

/// Marker that a role slot on an application has been claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub pk: PartitionKey,
    pub sk: SortKey,
    pub created_at: DateTime<Utc>,
}

/// A dated fact about an application stored beside it, such as evidence arriving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub pk: PartitionKey,
    pub sk: SortKey,
    pub uid: ExternalUid,
    pub recorded_at: DateTime<Utc>,
}

/// Everything the engine stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "item_type", rename_all = "snake_case")]
pub enum Item {
    Application(ApplicationRecord),
    Index(SecondaryIndexRecord),
    FollowUp(ScheduledFollowUp),
    Reservation(ReservationRecord),
    Marker(MarkerRecord),
}

impl Item {
    pub fn key(&self) -> RecordKey {
        match self {
            Item::Application(record) => record.key(),
            Item::Index(index) => RecordKey::new(index.pk.clone(), index.sk.clone()),
            Item::FollowUp(follow_up) => follow_up.key(),
            Item::Reservation(reservation) => {
                RecordKey::new(reservation.pk.clone(), reservation.sk.clone())
            }
            Item::Marker(marker) => RecordKey::new(marker.pk.clone(), marker.sk.clone()),
        }
    }

    pub fn item_type(&self) -> &'static str {
        match self {
            Item::Application(_) => "application",
            Item::Index(_) => "index",
            Item::FollowUp(_) => "follow_up",
            Item::Reservation(_) => "reservation",
            Item::Marker(_) => "marker",
        }
    }

    pub fn integrity_hash(&self) -> Option<&str> {
        match self {
            Item::Application(record) => Some(&record.integrity_hash),
            _ => None,
        }
    }
}

impl From<ApplicationRecord> for Item {
    fn from(record: ApplicationRecord) -> Self {
        Item::Application(record)
    }
}

impl From<SecondaryIndexRecord> for Item {
    fn from(index: SecondaryIndexRecord) -> Self {
        Item::Index(index)
    }
}

impl From<ScheduledFollowUp> for Item {
    fn from(follow_up: ScheduledFollowUp) -> Self {
        Item::FollowUp(follow_up)
    }
}

impl From<ReservationRecord> for Item {
    fn from(reservation: ReservationRecord) -> Self {
        Item::Reservation(reservation)
    }
}

impl From<MarkerRecord> for Item {
    fn from(marker: MarkerRecord) -> Self {
        Item::Marker(marker)
    }
}
