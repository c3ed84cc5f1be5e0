//! Kind-specific detail payloads and the decoded event union.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::EventKind;
use crate::domain::{ApplicationType, ExternalUid, FeeType, FollowUpAction, Person};
use crate::store::RecordKey;

/// Detail carrying only the external UID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UidEvent {
    pub uid: ExternalUid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseIdentifierRequested {
    pub application_id: String,
    pub donor_session_id: String,
    pub application_type: ApplicationType,
    pub donor: Person,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeApproved {
    pub uid: ExternalUid,
    pub approved_type: FeeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityCorrespondenceSent {
    pub uid: ExternalUid,
    pub sent_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    WaitingPeriodEntered,
    CannotRegister,
}

impl StatusChange {
    pub fn parse(value: &str) -> Option<StatusChange> {
        match value {
            "waiting-period-entered" | "STATUTORY_WAITING_PERIOD" => {
                Some(StatusChange::WaitingPeriodEntered)
            }
            "cannot-register" | "CANNOT_REGISTER" => Some(StatusChange::CannotRegister),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusChange::WaitingPeriodEntered => "waiting-period-entered",
            StatusChange::CannotRegister => "cannot-register",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatusChanged {
    uid: ExternalUid,
    change_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationStatusChanged {
    pub uid: ExternalUid,
    pub change: StatusChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpDue {
    pub action: FollowUpAction,
    pub target: RecordKey,
    pub uid: ExternalUid,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Malformed(#[from] serde_json::Error),

    /// The payload decoded but names a change type nothing handles.
    #[error("unknown change type {0}")]
    UnknownChangeType(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    CaseIdentifierRequested(CaseIdentifierRequested),
    EvidenceReceived(UidEvent),
    FeeApproved(FeeApproved),
    FeeDenied(UidEvent),
    MoreEvidenceRequired(UidEvent),
    FurtherInfoRequested(UidEvent),
    DonorSubmissionCompleted(UidEvent),
    CertificateProviderSubmissionCompleted(UidEvent),
    PriorityCorrespondenceSent(PriorityCorrespondenceSent),
    CertificateProviderIdentityCheckFailed(UidEvent),
    ApplicationStatusChanged(ApplicationStatusChanged),
    FollowUpDue(FollowUpDue),
}

fn detail<T: DeserializeOwned>(value: &Value) -> Result<T, DecodeError> {
    Ok(T::deserialize(value)?)
}

impl InboundEvent {
    pub fn decode(kind: EventKind, payload: &Value) -> Result<Self, DecodeError> {
        let event = match kind {
            EventKind::CaseIdentifierRequested => {
                InboundEvent::CaseIdentifierRequested(detail(payload)?)
            }
            EventKind::EvidenceReceived => InboundEvent::EvidenceReceived(detail(payload)?),
            EventKind::FeeApproved => InboundEvent::FeeApproved(detail(payload)?),
            EventKind::FeeDenied => InboundEvent::FeeDenied(detail(payload)?),
            EventKind::MoreEvidenceRequired => InboundEvent::MoreEvidenceRequired(detail(payload)?),
            EventKind::FurtherInfoRequested => InboundEvent::FurtherInfoRequested(detail(payload)?),
            EventKind::DonorSubmissionCompleted => {
                InboundEvent::DonorSubmissionCompleted(detail(payload)?)
            }
            EventKind::CertificateProviderSubmissionCompleted => {
                InboundEvent::CertificateProviderSubmissionCompleted(detail(payload)?)
            }
            EventKind::PriorityCorrespondenceSent => {
                InboundEvent::PriorityCorrespondenceSent(detail(payload)?)
            }
            EventKind::CertificateProviderIdentityCheckFailed => {
                InboundEvent::CertificateProviderIdentityCheckFailed(detail(payload)?)
            }
            EventKind::ApplicationStatusChanged => {
                let raw: RawStatusChanged = detail(payload)?;
                let change = StatusChange::parse(&raw.change_type)
                    .ok_or(DecodeError::UnknownChangeType(raw.change_type))?;
                InboundEvent::ApplicationStatusChanged(ApplicationStatusChanged {
                    uid: raw.uid,
                    change,
                })
            }
            EventKind::FollowUpDue => InboundEvent::FollowUpDue(detail(payload)?),
        };
        Ok(event)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::CaseIdentifierRequested(_) => EventKind::CaseIdentifierRequested,
            InboundEvent::EvidenceReceived(_) => EventKind::EvidenceReceived,
            InboundEvent::FeeApproved(_) => EventKind::FeeApproved,
            InboundEvent::FeeDenied(_) => EventKind::FeeDenied,
            InboundEvent::MoreEvidenceRequired(_) => EventKind::MoreEvidenceRequired,
            InboundEvent::FurtherInfoRequested(_) => EventKind::FurtherInfoRequested,
            InboundEvent::DonorSubmissionCompleted(_) => EventKind::DonorSubmissionCompleted,
            InboundEvent::CertificateProviderSubmissionCompleted(_) => {
                EventKind::CertificateProviderSubmissionCompleted
            }
            InboundEvent::PriorityCorrespondenceSent(_) => EventKind::PriorityCorrespondenceSent,
            InboundEvent::CertificateProviderIdentityCheckFailed(_) => {
                EventKind::CertificateProviderIdentityCheckFailed
            }
            InboundEvent::ApplicationStatusChanged(_) => EventKind::ApplicationStatusChanged,
            InboundEvent::FollowUpDue(_) => EventKind::FollowUpDue,
        }
    }

    /// The external UID the event is about, when it carries one.
    pub fn uid(&self) -> Option<&ExternalUid> {
        match self {
            InboundEvent::CaseIdentifierRequested(_) => None,
            InboundEvent::EvidenceReceived(event)
            | InboundEvent::FeeDenied(event)
            | InboundEvent::MoreEvidenceRequired(event)
            | InboundEvent::FurtherInfoRequested(event)
            | InboundEvent::DonorSubmissionCompleted(event)
            | InboundEvent::CertificateProviderSubmissionCompleted(event)
            | InboundEvent::CertificateProviderIdentityCheckFailed(event) => Some(&event.uid),
            InboundEvent::FeeApproved(event) => Some(&event.uid),
            InboundEvent::PriorityCorrespondenceSent(event) => Some(&event.uid),
            InboundEvent::ApplicationStatusChanged(event) => Some(&event.uid),
            InboundEvent::FollowUpDue(event) => Some(&event.uid),
        }
    }
}
