use std::fmt;

/// Whether an event comes from another system or from this service's own
/// schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    External,
    Internal,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::External => "external",
            Category::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    CaseManagement,
    PaymentApproval,
    Register,
    Application,
    Scheduler,
}

impl Source {
    pub const ALL: [Source; 5] = [
        Source::CaseManagement,
        Source::PaymentApproval,
        Source::Register,
        Source::Application,
        Source::Scheduler,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Source::CaseManagement => "case-management",
            Source::PaymentApproval => "payment-approval",
            Source::Register => "register",
            Source::Application => "application",
            Source::Scheduler => "scheduler",
        }
    }

    pub fn parse(value: &str) -> Option<Source> {
        Source::ALL.into_iter().find(|source| source.as_str() == value)
    }

    pub fn category(self) -> Category {
        match self {
            Source::CaseManagement | Source::PaymentApproval | Source::Register => {
                Category::External
            }
            Source::Application | Source::Scheduler => Category::Internal,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every event kind the engine handles. The registry routes exactly what
/// [`EventKind::ALL`] lists, so a new variant must be added there too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CaseIdentifierRequested,
    EvidenceReceived,
    FeeApproved,
    FeeDenied,
    MoreEvidenceRequired,
    FurtherInfoRequested,
    DonorSubmissionCompleted,
    CertificateProviderSubmissionCompleted,
    PriorityCorrespondenceSent,
    CertificateProviderIdentityCheckFailed,
    ApplicationStatusChanged,
    FollowUpDue,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::CaseIdentifierRequested,
        EventKind::EvidenceReceived,
        EventKind::FeeApproved,
        EventKind::FeeDenied,
        EventKind::MoreEvidenceRequired,
        EventKind::FurtherInfoRequested,
        EventKind::DonorSubmissionCompleted,
        EventKind::CertificateProviderSubmissionCompleted,
        EventKind::PriorityCorrespondenceSent,
        EventKind::CertificateProviderIdentityCheckFailed,
        EventKind::ApplicationStatusChanged,
        EventKind::FollowUpDue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::CaseIdentifierRequested => "case-identifier-requested",
            EventKind::EvidenceReceived => "evidence-received",
            EventKind::FeeApproved => "fee-approved",
            EventKind::FeeDenied => "fee-denied",
            EventKind::MoreEvidenceRequired => "more-evidence-required",
            EventKind::FurtherInfoRequested => "further-info-requested",
            EventKind::DonorSubmissionCompleted => "donor-submission-completed",
            EventKind::CertificateProviderSubmissionCompleted => {
                "certificate-provider-submission-completed"
            }
            EventKind::PriorityCorrespondenceSent => "priority-correspondence-sent",
            EventKind::CertificateProviderIdentityCheckFailed => {
                "certificate-provider-identity-check-failed"
            }
            EventKind::ApplicationStatusChanged => "application-status-changed",
            EventKind::FollowUpDue => "follow-up-due",
        }
    }

    /// The one source allowed to emit this kind.
    pub fn source(self) -> Source {
        match self {
            EventKind::CaseIdentifierRequested => Source::Application,
            EventKind::FeeApproved
            | EventKind::FeeDenied
            | EventKind::MoreEvidenceRequired
            | EventKind::FurtherInfoRequested => Source::PaymentApproval,
            EventKind::EvidenceReceived
            | EventKind::DonorSubmissionCompleted
            | EventKind::CertificateProviderSubmissionCompleted
            | EventKind::PriorityCorrespondenceSent
            | EventKind::CertificateProviderIdentityCheckFailed => Source::CaseManagement,
            EventKind::ApplicationStatusChanged => Source::Register,
            EventKind::FollowUpDue => Source::Scheduler,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
