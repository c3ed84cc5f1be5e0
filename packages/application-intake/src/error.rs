//! Engine error taxonomy.
//!
//! Each variant carries the event kind, the external UID when one is known and,
//! where relevant, the step that failed, so a log line is enough for triage.
//! [`EngineError::class`] tells the host whether redelivery can help.

use thiserror::Error;

use crate::context::Interruption;
use crate::domain::ExternalUid;
use crate::effects::Step;
use crate::events::EventKind;
use crate::store::StoreError;

/// Whether retrying the same event could ever succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Terminal,
    Retryable,
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// The detail payload did not decode into the kind's structure.
    #[error("malformed {kind} event: {reason}")]
    MalformedEvent { kind: EventKind, reason: String },

    /// No handler is registered for the (source, kind) pair.
    #[error("unrecognized event {origin}/{kind}")]
    UnrecognizedEvent { origin: String, kind: String },

    /// The UID index or the primary record it points at is absent.
    #[error("{kind}: no record for {lookup}")]
    RecordMissing { kind: EventKind, lookup: String },

    /// A collaborator call failed. Steps in `performed` completed before it
    /// and are not undone.
    #[error("{kind} for {}: {step} failed: {source}", uid_label(.uid))]
    DownstreamFailure {
        kind: EventKind,
        uid: Option<ExternalUid>,
        step: Step,
        terminal: bool,
        performed: Vec<Step>,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The final put or transaction failed. Steps in `performed` already
    /// happened and are not undone.
    #[error("{kind} for {}: persisting failed after [{}]: {source}", uid_label(.uid), step_list(.performed))]
    PersistenceFailure {
        kind: EventKind,
        uid: Option<ExternalUid>,
        performed: Vec<Step>,
        #[source]
        source: StoreError,
    },

    #[error("{kind} for {}: {reason} during {step}", uid_label(.uid))]
    Interrupted {
        kind: EventKind,
        uid: Option<ExternalUid>,
        step: Step,
        reason: Interruption,
        performed: Vec<Step>,
    },
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::MalformedEvent { .. } | EngineError::UnrecognizedEvent { .. } => {
                ErrorClass::Terminal
            }
            EngineError::DownstreamFailure { terminal: true, .. } => ErrorClass::Terminal,
            EngineError::RecordMissing { .. }
            | EngineError::DownstreamFailure { .. }
            | EngineError::PersistenceFailure { .. }
            | EngineError::Interrupted { .. } => ErrorClass::Retryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// True when something externally visible happened before the failure,
    /// i.e. "effect happened, state not recorded".
    pub fn side_effects_performed(&self) -> bool {
        match self {
            EngineError::DownstreamFailure { performed, .. }
            | EngineError::PersistenceFailure { performed, .. }
            | EngineError::Interrupted { performed, .. } => !performed.is_empty(),
            _ => false,
        }
    }

    /// The step that failed, when the failure belongs to one.
    pub fn step(&self) -> Option<Step> {
        match self {
            EngineError::DownstreamFailure { step, .. } | EngineError::Interrupted { step, .. } => {
                Some(*step)
            }
            EngineError::PersistenceFailure { .. } => Some(Step::Persist),
            _ => None,
        }
    }

    /// The routed event kind. Unrecognized events never got one.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            EngineError::UnrecognizedEvent { .. } => None,
            EngineError::MalformedEvent { kind, .. }
            | EngineError::RecordMissing { kind, .. }
            | EngineError::DownstreamFailure { kind, .. }
            | EngineError::PersistenceFailure { kind, .. }
            | EngineError::Interrupted { kind, .. } => Some(*kind),
        }
    }

    pub fn uid(&self) -> Option<&ExternalUid> {
        match self {
            EngineError::DownstreamFailure { uid, .. }
            | EngineError::PersistenceFailure { uid, .. }
            | EngineError::Interrupted { uid, .. } => uid.as_ref(),
            _ => None,
        }
    }
}

fn uid_label(uid: &Option<ExternalUid>) -> String {
    uid.as_ref()
        .map(|uid| uid.to_string())
        .unwrap_or_else(|| "unassigned uid".to_string())
}

fn step_list(steps: &[Step]) -> String {
    steps
        .iter()
        .map(|step| step.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn uid() -> Option<ExternalUid> {
        Some(ExternalUid::new("M-1111-2222-3333"))
    }

    #[test]
    fn decoding_failures_are_terminal() {
        let malformed = EngineError::MalformedEvent {
            kind: EventKind::FeeApproved,
            reason: "missing field `uid`".to_string(),
        };
        let unrecognized = EngineError::UnrecognizedEvent {
            origin: "case-management".to_string(),
            kind: "made-up".to_string(),
        };

        assert_eq!(malformed.class(), ErrorClass::Terminal);
        assert_eq!(unrecognized.class(), ErrorClass::Terminal);
    }

    #[test]
    fn persistence_failure_reports_prior_effects() {
        let err = EngineError::PersistenceFailure {
            kind: EventKind::DonorSubmissionCompleted,
            uid: uid(),
            performed: vec![Step::InviteCertificateProvider],
            source: StoreError::Backend("table unavailable".into()),
        };

        assert!(err.is_retryable());
        assert!(err.side_effects_performed());
        assert_eq!(
            err.to_string(),
            "donor-submission-completed for M-1111-2222-3333: persisting failed after \
             [invite certificate provider]: store backend error: table unavailable"
        );
    }

    #[test]
    fn downstream_failure_names_the_step() {
        let err = EngineError::DownstreamFailure {
            kind: EventKind::FeeApproved,
            uid: uid(),
            step: Step::PublishCertificateProviderStarted,
            terminal: false,
            performed: vec![Step::SendToCaseStore],
            source: "bus unavailable".into(),
        };

        assert_eq!(err.step(), Some(Step::PublishCertificateProviderStarted));
        assert!(err.side_effects_performed());
        assert!(err
            .to_string()
            .contains("publish certificate-provider-started failed"));
    }

    #[test]
    fn first_step_failure_reports_nothing_performed() {
        let err = EngineError::DownstreamFailure {
            kind: EventKind::FeeApproved,
            uid: uid(),
            step: Step::SendToCaseStore,
            terminal: false,
            performed: Vec::new(),
            source: "case store unavailable".into(),
        };

        assert!(!err.side_effects_performed());
    }

    #[test]
    fn missing_uid_is_labelled() {
        let err = EngineError::Interrupted {
            kind: EventKind::CaseIdentifierRequested,
            uid: None,
            step: Step::CreateCase,
            reason: Interruption::DeadlineExceeded,
            performed: vec![],
        };

        assert_eq!(
            err.to_string(),
            "case-identifier-requested for unassigned uid: deadline exceeded during create case"
        );
    }
}
