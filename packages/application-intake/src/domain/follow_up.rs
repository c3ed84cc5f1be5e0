use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ExternalUid;
use crate::store::{PartitionKey, RecordKey, SortKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FollowUpAction {
    RemindCertificateProviderToComplete,
    RemindCertificateProviderToConfirmIdentity,
}

impl FollowUpAction {
    pub fn as_str(self) -> &'static str {
        match self {
            FollowUpAction::RemindCertificateProviderToComplete => {
                "remind-certificate-provider-to-complete"
            }
            FollowUpAction::RemindCertificateProviderToConfirmIdentity => {
                "remind-certificate-provider-to-confirm-identity"
            }
        }
    }
}

impl fmt::Display for FollowUpAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a certificate provider invited at `invited_at` is due a reminder:
/// three calendar months and a day later.
pub fn reminder_due(invited_at: DateTime<Utc>) -> DateTime<Utc> {
    invited_at
        .checked_add_months(Months::new(3))
        .and_then(|due| due.checked_add_signed(Duration::days(1)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A future action against an application. `target` is a lookup reference
/// only; the follow-up does not own the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledFollowUp {
    pub pk: PartitionKey,
    pub sk: SortKey,
    pub due_at: DateTime<Utc>,
    pub action: FollowUpAction,
    pub target: RecordKey,
    pub uid: ExternalUid,
}

impl ScheduledFollowUp {
    pub fn new(
        due_at: DateTime<Utc>,
        action: FollowUpAction,
        target: RecordKey,
        uid: ExternalUid,
        application_id: &str,
    ) -> Self {
        Self {
            pk: PartitionKey::scheduled_day(due_at),
            sk: SortKey::scheduled(due_at, application_id),
            due_at,
            action,
            target,
            uid,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.pk.clone(), self.sk.clone())
    }
}
