use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{
    ApplicationType, CaseDocument, Channel, ExternalUid, FeeDetails, Obligation, Person, TaskState,
    Tasks,
};
use crate::store::{PartitionKey, RecordKey, SortKey};

/// Timestamps recording that a one-off step has happened. Several guards use
/// these as their idempotency predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Milestones {
    pub fee_decision_at: Option<DateTime<Utc>>,
    pub more_evidence_required_at: Option<DateTime<Utc>>,
    pub certificate_provider_invited_at: Option<DateTime<Utc>>,
    pub certificate_provider_reminded_at: Option<DateTime<Utc>>,
    pub voucher_invited_at: Option<DateTime<Utc>>,
    pub attorneys_invited_at: Option<DateTime<Utc>>,
    pub priority_correspondence_sent_at: Option<DateTime<Utc>>,
    pub identity_check_failure_notified_at: Option<DateTime<Utc>>,
    pub statutory_waiting_period_at: Option<DateTime<Utc>>,
    pub cannot_register_at: Option<DateTime<Utc>>,
}

/// The canonical per-case entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub pk: PartitionKey,
    pub sk: SortKey,
    pub application_id: String,
    pub external_uid: Option<ExternalUid>,
    pub application_type: Option<ApplicationType>,
    #[serde(default)]
    pub channel: Channel,
    #[serde(default)]
    pub donor: Person,
    #[serde(default)]
    pub certificate_provider: Person,
    #[serde(default)]
    pub voucher: Option<Person>,
    #[serde(default)]
    pub voucher_allowed: bool,
    #[serde(default)]
    pub tasks: Tasks,
    #[serde(default)]
    pub fee: FeeDetails,
    #[serde(default)]
    pub milestones: Milestones,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub integrity_hash: String,
}

/// Fields that define the record's content. `updated_at`, `version` and the
/// hash itself are bookkeeping and stay out.
#[derive(Serialize)]
struct HashedFields<'a> {
    pk: &'a PartitionKey,
    sk: &'a SortKey,
    external_uid: &'a Option<ExternalUid>,
    application_type: &'a Option<ApplicationType>,
    channel: Channel,
    donor: &'a Person,
    certificate_provider: &'a Person,
    voucher: &'a Option<Person>,
    voucher_allowed: bool,
    tasks: &'a Tasks,
    fee: &'a FeeDetails,
    milestones: &'a Milestones,
}

impl ApplicationRecord {
    /// An online application started by a donor session.
    pub fn new(application_id: &str, session_id: &str, now: DateTime<Utc>) -> Self {
        let mut record = Self {
            pk: PartitionKey::application(application_id),
            sk: SortKey::donor(session_id),
            application_id: application_id.to_string(),
            external_uid: None,
            application_type: None,
            channel: Channel::Online,
            donor: Person::default(),
            certificate_provider: Person::default(),
            voucher: None,
            voucher_allowed: false,
            tasks: Tasks::default(),
            fee: FeeDetails::default(),
            milestones: Milestones::default(),
            version: 1,
            created_at: now,
            updated_at: now,
            integrity_hash: String::new(),
        };
        record.integrity_hash = record.compute_hash();
        record
    }

    /// A record synthesised for a paper application that was submitted
    /// without ever going through the online service. The certificate provider
    /// is invited as the record is created.
    pub fn paper(application_id: &str, case: &CaseDocument, now: DateTime<Utc>) -> Self {
        let mut record = Self::new(application_id, "PAPER", now);
        record.external_uid = Some(case.uid.clone());
        record.application_type = Some(case.application_type);
        record.channel = Channel::Paper;
        record.donor = case.donor.clone();
        record.certificate_provider = case.certificate_provider.clone();
        record.tasks.sign = TaskState::Completed;
        record.milestones.certificate_provider_invited_at = Some(now);
        record.integrity_hash = record.compute_hash();
        record
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.pk.clone(), self.sk.clone())
    }

    pub fn obligation(&self) -> Obligation {
        self.fee.obligation(self.tasks.pay_for_application)
    }

    pub fn compute_hash(&self) -> String {
        let fields = HashedFields {
            pk: &self.pk,
            sk: &self.sk,
            external_uid: &self.external_uid,
            application_type: &self.application_type,
            channel: self.channel,
            donor: &self.donor,
            certificate_provider: &self.certificate_provider,
            voucher: &self.voucher,
            voucher_allowed: self.voucher_allowed,
            tasks: &self.tasks,
            fee: &self.fee,
            milestones: &self.milestones,
        };
        // Plain structs with string keys; serialisation cannot fail.
        let bytes = serde_json::to_vec(&fields).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    }

    /// Stamp a mutation: `updated_at`, version and hash.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
        self.integrity_hash = self.compute_hash();
    }
}
