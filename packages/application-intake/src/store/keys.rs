//! Composite keys and their prefixes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::ExternalUid;

pub const APPLICATION_PREFIX: &str = "LPA#";
pub const UID_PREFIX: &str = "UID#";
pub const SCHEDULED_DAY_PREFIX: &str = "SCHEDULED_DAY#";
pub const DONOR_PREFIX: &str = "DONOR#";
pub const METADATA_PREFIX: &str = "METADATA#";
pub const RESERVED_PREFIX: &str = "RESERVED#";
pub const SCHEDULED_PREFIX: &str = "SCHEDULED#";
pub const EVIDENCE_RECEIVED: &str = "EVIDENCE_RECEIVED";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn application(application_id: &str) -> Self {
        Self(format!("{APPLICATION_PREFIX}{application_id}"))
    }

    pub fn uid(uid: &ExternalUid) -> Self {
        Self(format!("{UID_PREFIX}{uid}"))
    }

    pub fn scheduled_day(at: DateTime<Utc>) -> Self {
        Self(format!("{SCHEDULED_DAY_PREFIX}{}", at.format("%Y-%m-%d")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_application(&self) -> bool {
        self.0.starts_with(APPLICATION_PREFIX)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortKey(String);

impl SortKey {
    pub fn donor(session_id: &str) -> Self {
        Self(format!("{DONOR_PREFIX}{session_id}"))
    }

    pub fn metadata() -> Self {
        Self(METADATA_PREFIX.to_string())
    }

    /// Reservation of a role slot, e.g. `RESERVED#DONOR#`.
    pub fn reserved(role_prefix: &str) -> Self {
        Self(format!("{RESERVED_PREFIX}{role_prefix}"))
    }

    pub fn scheduled(at: DateTime<Utc>, discriminator: &str) -> Self {
        Self(format!(
            "{SCHEDULED_PREFIX}{}#{discriminator}",
            at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ))
    }

    pub fn evidence_received() -> Self {
        Self(EVIDENCE_RECEIVED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_donor(&self) -> bool {
        self.0.starts_with(DONOR_PREFIX)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub pk: PartitionKey,
    pub sk: SortKey,
}

impl RecordKey {
    pub fn new(pk: PartitionKey, sk: SortKey) -> Self {
        Self { pk, sk }
    }

    /// Where the secondary index entry for `uid` lives.
    pub fn uid_index(uid: &ExternalUid) -> Self {
        Self::new(PartitionKey::uid(uid), SortKey::metadata())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pk, self.sk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_carry_their_prefixes() {
        let uid = ExternalUid::new("M-0000-1111-2222");

        assert_eq!(PartitionKey::application("abc").as_str(), "LPA#abc");
        assert_eq!(RecordKey::uid_index(&uid).to_string(), "UID#M-0000-1111-2222/METADATA#");
        assert_eq!(SortKey::reserved(DONOR_PREFIX).as_str(), "RESERVED#DONOR#");
        assert!(SortKey::donor("PAPER").is_donor());
        assert!(!SortKey::evidence_received().is_donor());
    }
}
